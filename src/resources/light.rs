//! The `openhue_light` resource.
//!
//! Lights cannot be created or destroyed through the bridge API: "creating"
//! one adopts an existing light by its exact name and pushes the desired
//! state to it, and deleting is a no-op.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use super::{require_id, Resource};
use crate::config::PROVIDER_TYPE_NAME;
use crate::error::ProviderError;
use crate::hue::{Color, Dimming, GamutPosition, HueApi, LightGet, LightPut, On};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// A light already known to the bridge.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightResource;

/// Colour as stored in state: CIE xy plus luminance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorXyz {
    /// x chromaticity.
    #[serde(default)]
    pub x: f64,
    /// y chromaticity.
    #[serde(default)]
    pub y: f64,
    /// Luminance.
    #[serde(default)]
    pub z: f64,
}

impl ColorXyz {
    /// The all-zero default means "leave the colour alone".
    fn is_unset(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LightState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    brightness: Option<f64>,
    #[serde(default)]
    color: Option<ColorXyz>,
}

impl LightState {
    fn from_value(value: Value) -> Result<Self, ProviderError> {
        let mut state: Self = serde_json::from_value(value)?;
        state.on.get_or_insert(false);
        state.color.get_or_insert_with(ColorXyz::default);
        Ok(state)
    }

    fn to_payload(&self) -> LightPut {
        LightPut {
            on: Some(On {
                on: self.on.unwrap_or(false),
            }),
            dimming: self.brightness.map(|brightness| Dimming { brightness }),
            color: self.color.filter(|c| !c.is_unset()).map(|c| Color {
                xy: GamutPosition { x: c.x, y: c.y },
            }),
        }
    }

    fn into_value(self) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Find a light by exact name, listing the available names on failure.
pub(crate) fn find_light_by_name(
    lights: Vec<LightGet>,
    name: &str,
) -> Result<LightGet, ProviderError> {
    let names: Vec<String> = lights.iter().map(|l| l.metadata.name.clone()).collect();
    lights
        .into_iter()
        .find(|light| light.metadata.name == name)
        .ok_or_else(|| {
            ProviderError::NotFound(format!(
                "light {:?} not found. Available lamps {}",
                name,
                names.join(", ")
            ))
        })
}

async fn push_state(
    client: &dyn HueApi,
    id: &str,
    state: &LightState,
) -> Result<(), ProviderError> {
    let updated = client.update_light(id, &state.to_payload()).await?;
    if updated.is_empty() {
        return Err(ProviderError::NotFound(
            "no data in light update response".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl Resource for LightResource {
    fn type_name(&self) -> String {
        format!("{}_light", PROVIDER_TYPE_NAME)
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A light in the Hue system")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("The ID of the light"),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description(
                        "The name of the light. This MUST match the name of the light in the \
                         Hue system exactly in order for the provider to find the light.",
                    ),
            )
            .with_attribute(
                "on",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_description("Whether the light is on or off"),
            )
            .with_attribute(
                "brightness",
                Attribute::optional_float64().with_description("The brightness of the light"),
            )
            .with_attribute(
                "color",
                Attribute::new(
                    AttributeType::object([
                        ("x", AttributeType::Float64),
                        ("y", AttributeType::Float64),
                        ("z", AttributeType::Float64),
                    ]),
                    AttributeFlags::optional_computed(),
                )
                .with_default(json!({"x": 0.0, "y": 0.0, "z": 0.0}))
                .with_description("The color of the light"),
            )
    }

    #[instrument(skip_all)]
    async fn create(&self, client: &dyn HueApi, planned: Value) -> Result<Value, ProviderError> {
        let mut state = LightState::from_value(planned)?;

        let light = find_light_by_name(client.list_lights().await?, &state.name)?;
        info!(id = %light.id, name = %state.name, "Updating light");

        push_state(client, &light.id, &state).await?;
        state.id = Some(light.id);
        state.into_value()
    }

    #[instrument(skip_all)]
    async fn read(&self, client: &dyn HueApi, current: Value) -> Result<Value, ProviderError> {
        let id = require_id(&current, "light")?;
        info!(%id, "Reading light");

        let prior = LightState::from_value(current)?;
        let light = client.get_light(&id).await?;

        LightState {
            id: Some(light.id),
            name: light.metadata.name,
            on: Some(light.on.on),
            brightness: light.dimming.map(|d| d.brightness),
            color: prior.color,
        }
        .into_value()
    }

    #[instrument(skip_all)]
    async fn update(
        &self,
        client: &dyn HueApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let id = require_id(&planned, "light").or_else(|_| require_id(&prior, "light"))?;
        info!(%id, "Updating light");

        let mut state = LightState::from_value(planned)?;
        push_state(client, &id, &state).await?;
        state.id = Some(id);
        state.into_value()
    }

    async fn delete(&self, _client: &dyn HueApi, current: Value) -> Result<(), ProviderError> {
        debug!(id = ?current.get("id"), "Lights cannot be deleted, forgetting it");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBridge;

    fn bridge() -> FakeBridge {
        FakeBridge::new()
            .with_light("l1", "Desk", false)
            .with_light("l2", "Shelf", true)
    }

    #[tokio::test]
    async fn test_create_adopts_light_by_name() {
        let bridge = bridge();
        let state = LightResource
            .create(&bridge, json!({"name": "Shelf", "on": false, "brightness": 40.0}))
            .await
            .unwrap();

        assert_eq!(state["id"], "l2");
        assert_eq!(state["color"], json!({"x": 0.0, "y": 0.0, "z": 0.0}));

        let light = bridge.light("l2").unwrap();
        assert!(!light.on.on);
        assert_eq!(light.dimming, Some(Dimming { brightness: 40.0 }));
    }

    #[tokio::test]
    async fn test_create_unknown_name_lists_available() {
        let bridge = bridge();
        let err = LightResource
            .create(&bridge, json!({"name": "Lamp"}))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::NotFound(_)));
        let message = err.message();
        assert!(message.contains("\"Lamp\" not found"));
        assert!(message.contains("Available lamps Desk, Shelf"));
    }

    #[tokio::test]
    async fn test_name_match_is_exact() {
        let bridge = bridge();
        assert!(LightResource
            .create(&bridge, json!({"name": "desk"}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_read_keeps_prior_color() {
        let bridge = bridge();
        let prior = json!({
            "id": "l1",
            "name": "Desk",
            "on": true,
            "color": {"x": 0.64, "y": 0.33, "z": 0.21}
        });

        let state = LightResource.read(&bridge, prior).await.unwrap();
        assert_eq!(state["on"], false);
        assert_eq!(state["color"]["x"], 0.64);
    }

    #[tokio::test]
    async fn test_update_sends_color_only_when_set() {
        let bridge = bridge();

        LightResource
            .update(
                &bridge,
                json!({"id": "l1", "name": "Desk"}),
                json!({"id": "l1", "name": "Desk", "on": true}),
            )
            .await
            .unwrap();
        let sent = bridge.last_light_update("l1").unwrap();
        assert_eq!(sent.on, Some(On { on: true }));
        assert!(sent.color.is_none());

        LightResource
            .update(
                &bridge,
                json!({"id": "l1", "name": "Desk"}),
                json!({"id": "l1", "name": "Desk", "color": {"x": 0.3, "y": 0.4, "z": 1.0}}),
            )
            .await
            .unwrap();
        let sent = bridge.last_light_update("l1").unwrap();
        assert_eq!(sent.color.unwrap().xy, GamutPosition { x: 0.3, y: 0.4 });
        assert_eq!(sent.on, Some(On { on: false }));
    }

    #[tokio::test]
    async fn test_delete_is_noop() {
        let bridge = bridge();
        LightResource
            .delete(&bridge, json!({"id": "l1", "name": "Desk"}))
            .await
            .unwrap();
        assert!(bridge.light("l1").is_some());
    }
}
