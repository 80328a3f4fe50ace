//! Managed resource types and the schema-driven planner they share.

pub mod light;
pub mod room;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::hue::HueApi;
use crate::schema::{Diagnostic, Schema};
use crate::types::{AttributeChange, PlanResult};

pub use light::LightResource;
pub use room::RoomResource;

/// A resource type managed through the bridge.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Full type name, e.g. `openhue_room`.
    fn type_name(&self) -> String;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Checks beyond what the schema expresses.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Create the resource and return its new state.
    async fn create(&self, client: &dyn HueApi, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state from the bridge.
    async fn read(&self, client: &dyn HueApi, current: Value) -> Result<Value, ProviderError>;

    /// Apply `planned` and return the resulting state.
    async fn update(
        &self,
        client: &dyn HueApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the resource.
    async fn delete(&self, client: &dyn HueApi, current: Value) -> Result<(), ProviderError>;
}

/// Every resource type the provider registers.
pub fn all() -> Vec<Box<dyn Resource>> {
    vec![Box::new(RoomResource), Box::new(LightResource)]
}

/// Compute a plan from the schema alone.
///
/// Absent attributes take their declared default, computed attributes keep
/// their prior value, and a change to a `force_new` attribute requires
/// replacement. A null `proposed` state plans a destroy.
pub fn plan(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: Value,
) -> Result<PlanResult, ProviderError> {
    let mut names: Vec<&String> = schema.attributes.keys().collect();
    names.sort();

    let prior_obj = prior.and_then(Value::as_object);

    if proposed.is_null() {
        let changes = match prior_obj {
            Some(obj) => names
                .iter()
                .filter_map(|name| {
                    present(obj.get(name.as_str()))
                        .map(|value| AttributeChange::removed(name.as_str(), value.clone()))
                })
                .collect(),
            None => Vec::new(),
        };
        return Ok(PlanResult::with_changes(Value::Null, changes, false));
    }

    let mut planned: Map<String, Value> = match proposed {
        Value::Object(map) => map,
        other => {
            return Err(ProviderError::Validation(format!(
                "expected an object for planned state, got {}",
                other
            )))
        }
    };

    let mut carried = Vec::new();
    for name in &names {
        let attr = &schema.attributes[name.as_str()];
        if present(planned.get(name.as_str())).is_some() {
            continue;
        }
        if let Some(default) = &attr.default {
            planned.insert(name.to_string(), default.clone());
        } else if attr.flags.computed {
            if let Some(value) = prior_obj.and_then(|obj| present(obj.get(name.as_str()))) {
                planned.insert(name.to_string(), value.clone());
                carried.push(name.as_str());
            }
        }
    }

    let mut changes = Vec::new();
    let mut requires_replace = false;
    for name in &names {
        let before = prior_obj.and_then(|obj| present(obj.get(name.as_str())));
        let after = present(planned.get(name.as_str()));
        if before == after {
            continue;
        }
        if before.is_some() && schema.attributes[name.as_str()].force_new {
            requires_replace = true;
        }
        changes.push(AttributeChange::new(
            name.as_str(),
            before.cloned(),
            after.cloned(),
        ));
    }

    if requires_replace {
        // computed values belong to the resource being replaced
        for name in carried {
            if schema.attributes[name].flags.is_computed_only() {
                if let Some(old) = planned.remove(name) {
                    changes.push(AttributeChange::removed(name, old));
                }
            }
        }
    }

    Ok(PlanResult::with_changes(
        Value::Object(planned),
        changes,
        requires_replace,
    ))
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Read a required string attribute from a state object.
pub(crate) fn require_id(state: &Value, what: &str) -> Result<String, ProviderError> {
    state
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Validation(format!("{} state has no id", what)))
}
