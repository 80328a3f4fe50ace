//! The `openhue_light` data source.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::DataSource;
use crate::config::PROVIDER_TYPE_NAME;
use crate::error::ProviderError;
use crate::hue::HueApi;
use crate::resources::light::find_light_by_name;
use crate::schema::{Attribute, Schema};

/// Looks up a light by its exact name.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightDataSource;

#[derive(Debug, Deserialize)]
struct LightQuery {
    name: String,
}

#[async_trait]
impl DataSource for LightDataSource {
    fn type_name(&self) -> String {
        format!("{}_light", PROVIDER_TYPE_NAME)
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Look up a light in the Hue system by name")
            .with_attribute("name", Attribute::required_string())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("on", Attribute::computed_bool())
    }

    #[instrument(skip_all)]
    async fn read(&self, client: &dyn HueApi, config: Value) -> Result<Value, ProviderError> {
        let query: LightQuery = serde_json::from_value(config)?;
        let light = find_light_by_name(client.list_lights().await?, &query.name)?;
        info!(id = %light.id, name = %query.name, "Found light");

        Ok(json!({
            "name": query.name,
            "id": light.id,
            "on": light.on.on,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBridge;

    #[tokio::test]
    async fn test_read_finds_light() {
        let bridge = FakeBridge::new()
            .with_light("l1", "Desk", false)
            .with_light("l2", "Shelf", true);

        let state = LightDataSource
            .read(&bridge, json!({"name": "Shelf"}))
            .await
            .unwrap();
        assert_eq!(state, json!({"name": "Shelf", "id": "l2", "on": true}));
    }

    #[tokio::test]
    async fn test_read_missing_light() {
        let bridge = FakeBridge::new().with_light("l1", "Desk", false);
        let err = LightDataSource
            .read(&bridge, json!({"name": "Porch"}))
            .await
            .unwrap_err();
        assert!(err.message().contains("Available lamps Desk"));
    }

    #[test]
    fn test_schema_computed_fields() {
        let schema = LightDataSource.schema();
        assert!(schema.attributes["name"].flags.required);
        assert!(schema.attributes["id"].flags.is_computed_only());
        assert!(schema.attributes["on"].flags.is_computed_only());
    }
}
