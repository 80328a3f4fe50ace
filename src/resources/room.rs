//! The `openhue_room` resource.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use super::{require_id, Resource};
use crate::config::PROVIDER_TYPE_NAME;
use crate::error::ProviderError;
use crate::hue::{HueApi, ResourceIdentifier, RoomArchetype, RoomGet, RoomMetadata, RoomPut};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// A room grouping devices on the bridge.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomResource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RoomState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    archetype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lights: Option<Vec<String>>,
}

impl RoomState {
    fn from_value(value: Value) -> Result<Self, ProviderError> {
        Ok(serde_json::from_value(value)?)
    }

    fn to_payload(&self) -> Result<RoomPut, ProviderError> {
        let archetype = self
            .archetype
            .parse::<RoomArchetype>()
            .map_err(|e| ProviderError::Validation(e.to_string()))?;

        Ok(RoomPut {
            metadata: RoomMetadata {
                name: self.name.clone(),
                archetype,
            },
            children: self
                .lights
                .iter()
                .flatten()
                .map(ResourceIdentifier::device)
                .collect(),
        })
    }

    fn refreshed(&self, room: RoomGet) -> Self {
        let rids: Vec<String> = room.children.into_iter().map(|c| c.rid).collect();
        let lights = if rids.is_empty() && self.lights.is_none() {
            None
        } else {
            Some(rids)
        };

        Self {
            id: Some(room.id),
            name: room.metadata.name,
            archetype: room.metadata.archetype.to_string(),
            lights,
        }
    }

    fn into_value(self) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(self)?)
    }
}

#[async_trait]
impl Resource for RoomResource {
    fn type_name(&self) -> String {
        format!("{}_room", PROVIDER_TYPE_NAME)
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A room in the Hue system")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("The ID of the room"),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("The name of the room"),
            )
            .with_attribute(
                "archetype",
                Attribute::required_string().with_description("The archetype of the room"),
            )
            .with_attribute(
                "lights",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::optional(),
                )
                .with_description("The lights in the room"),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        match config.get("archetype").and_then(Value::as_str) {
            Some(archetype) if archetype.parse::<RoomArchetype>().is_err() => {
                vec![Diagnostic::error(format!("invalid archetype {}", archetype))
                    .with_detail(format!(
                        "Expected one of: {}",
                        RoomArchetype::ALL.map(|a| a.as_str()).join(", ")
                    ))
                    .with_attribute("archetype")]
            }
            _ => Vec::new(),
        }
    }

    #[instrument(skip_all)]
    async fn create(&self, client: &dyn HueApi, planned: Value) -> Result<Value, ProviderError> {
        let mut state = RoomState::from_value(planned)?;
        info!(name = %state.name, "Creating room");

        let created = client.create_room(&state.to_payload()?).await?;
        state.id = Some(created.rid);
        state.into_value()
    }

    #[instrument(skip_all)]
    async fn read(&self, client: &dyn HueApi, current: Value) -> Result<Value, ProviderError> {
        let id = require_id(&current, "room")?;
        info!(%id, "Reading room");

        let state = RoomState::from_value(current)?;
        let room = client.get_room(&id).await?;
        state.refreshed(room).into_value()
    }

    #[instrument(skip_all)]
    async fn update(
        &self,
        client: &dyn HueApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let id = require_id(&planned, "room").or_else(|_| require_id(&prior, "room"))?;
        info!(%id, "Updating room");

        let mut state = RoomState::from_value(planned)?;
        client.update_room(&id, &state.to_payload()?).await?;
        state.id = Some(id);
        state.into_value()
    }

    #[instrument(skip_all)]
    async fn delete(&self, client: &dyn HueApi, current: Value) -> Result<(), ProviderError> {
        let id = require_id(&current, "room")?;
        info!(%id, "Deleting room");
        client.delete_room(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBridge;
    use crate::validation::validate;
    use serde_json::json;

    #[test]
    fn test_schema_accepts_room_config() {
        let config = json!({"name": "Kitchen", "archetype": "kitchen", "lights": ["d1", "d2"]});
        assert!(validate(&RoomResource.schema(), &config).is_empty());
        assert!(RoomResource.validate(&config).is_empty());
    }

    #[test]
    fn test_validate_rejects_unknown_archetype() {
        let diagnostics = RoomResource.validate(&json!({"name": "Hall", "archetype": "ballroom"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "invalid archetype ballroom");
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("archetype"));
    }

    #[tokio::test]
    async fn test_create_posts_children_and_sets_id() {
        let bridge = FakeBridge::new();
        let state = RoomResource
            .create(
                &bridge,
                json!({"name": "Kitchen", "archetype": "kitchen", "lights": ["d1"]}),
            )
            .await
            .unwrap();

        let id = state["id"].as_str().unwrap().to_string();
        let room = bridge.room(&id).unwrap();
        assert_eq!(room.metadata.name, "Kitchen");
        assert_eq!(room.metadata.archetype, RoomArchetype::Kitchen);
        assert_eq!(room.children, vec![ResourceIdentifier::device("d1")]);
    }

    #[tokio::test]
    async fn test_create_with_bad_archetype_makes_no_call() {
        let bridge = FakeBridge::new();
        let err = RoomResource
            .create(&bridge, json!({"name": "Hall", "archetype": "ballroom"}))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Validation(ref m) if m == "invalid archetype ballroom"));
        assert_eq!(bridge.room_count(), 0);
    }

    #[tokio::test]
    async fn test_read_update_delete() {
        let bridge = FakeBridge::new();
        let created = RoomResource
            .create(&bridge, json!({"name": "Office", "archetype": "office"}))
            .await
            .unwrap();

        let read = RoomResource.read(&bridge, created.clone()).await.unwrap();
        assert_eq!(read, created);

        let mut planned = created.clone();
        planned["name"] = json!("Study");
        planned["lights"] = json!(["d7"]);
        let updated = RoomResource
            .update(&bridge, created.clone(), planned)
            .await
            .unwrap();
        assert_eq!(updated["name"], "Study");

        let read = RoomResource.read(&bridge, updated.clone()).await.unwrap();
        assert_eq!(read["lights"], json!(["d7"]));

        RoomResource.delete(&bridge, read).await.unwrap();
        assert_eq!(bridge.room_count(), 0);
    }

    #[tokio::test]
    async fn test_read_missing_room_fails() {
        let bridge = FakeBridge::new();
        let err = RoomResource
            .read(&bridge, json!({"id": "gone", "name": "x", "archetype": "other"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
