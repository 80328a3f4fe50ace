//! Read-only data sources.

pub mod light;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;
use crate::hue::HueApi;
use crate::schema::Schema;

pub use light::LightDataSource;

/// A data source answering queries against the bridge.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Full type name, e.g. `openhue_light`.
    fn type_name(&self) -> String;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Resolve `config` into a full state object.
    async fn read(&self, client: &dyn HueApi, config: Value) -> Result<Value, ProviderError>;
}

/// Every data source the provider registers.
pub fn all() -> Vec<Box<dyn DataSource>> {
    vec![Box::new(LightDataSource)]
}
