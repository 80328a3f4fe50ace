//! The Hue provider.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::auth::{
    BridgeAuthenticator, BridgeCredentials, BridgeDiscovery, CredentialAcquirer, CredentialStore,
    NetworkDiscovery, PairingClient,
};
use crate::config::{ProviderConfig, PROVIDER_TYPE_NAME};
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::functions::{self, Function};
use crate::hue::{HueApi, HueClient};
use crate::logging::mask;
use crate::resources::{self, Resource};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::PlanResult;
use crate::validation::{validate, validate_arguments};

/// Builds the bridge client once credentials are known.
pub type ClientFactory =
    Arc<dyn Fn(&BridgeCredentials) -> Result<Arc<dyn HueApi>, ProviderError> + Send + Sync>;

/// Provider managing rooms and lights on a Philips Hue bridge.
pub struct HueProvider {
    resources: Vec<Box<dyn Resource>>,
    data_sources: Vec<Box<dyn DataSource>>,
    functions: Vec<Box<dyn Function>>,
    store: CredentialStore,
    discovery: Arc<dyn BridgeDiscovery>,
    pairing: Arc<dyn PairingClient>,
    client_factory: ClientFactory,
    client: RwLock<Option<Arc<dyn HueApi>>>,
    credentials: RwLock<Option<BridgeCredentials>>,
    stop: watch::Sender<bool>,
}

impl HueProvider {
    /// Provider talking to a real bridge, with credentials cached in the
    /// user's home directory.
    pub fn new() -> Result<Self, ProviderError> {
        let factory: ClientFactory = Arc::new(
            |creds: &BridgeCredentials| -> Result<Arc<dyn HueApi>, ProviderError> {
                Ok(Arc::new(HueClient::new(creds)?))
            },
        );
        Ok(Self::with_parts(
            CredentialStore::new(),
            Arc::new(NetworkDiscovery::new()?),
            Arc::new(BridgeAuthenticator::new()?),
            factory,
        ))
    }

    /// Provider assembled from explicit parts.
    pub fn with_parts(
        store: CredentialStore,
        discovery: Arc<dyn BridgeDiscovery>,
        pairing: Arc<dyn PairingClient>,
        client_factory: ClientFactory,
    ) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            resources: resources::all(),
            data_sources: data_sources::all(),
            functions: functions::all(),
            store,
            discovery,
            pairing,
            client_factory,
            client: RwLock::new(None),
            credentials: RwLock::new(None),
            stop,
        }
    }

    /// Credentials from the last successful `configure`.
    pub async fn credentials(&self) -> Option<BridgeCredentials> {
        self.credentials.read().await.clone()
    }

    async fn client(&self) -> Result<Arc<dyn HueApi>, ProviderError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| ProviderError::Configuration("client is nil".to_string()))
    }

    fn resource(&self, type_name: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .iter()
            .find(|r| r.type_name() == type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn data_source(&self, type_name: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .iter()
            .find(|d| d.type_name() == type_name)
            .map(|d| d.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn function(&self, name: &str) -> Result<&dyn Function, ProviderError> {
        self.functions
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(format!("Unknown function: {}", name)))
    }
}

#[async_trait::async_trait]
impl ProviderService for HueProvider {
    fn type_name(&self) -> String {
        PROVIDER_TYPE_NAME.to_string()
    }

    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        let schema = self
            .resources
            .iter()
            .fold(schema, |s, r| s.with_resource(r.type_name(), r.schema()));
        let schema = self
            .data_sources
            .iter()
            .fold(schema, |s, d| s.with_data_source(d.type_name(), d.schema()));
        self.functions
            .iter()
            .fold(schema, |s, f| s.with_function(f.name(), f.definition()))
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&ProviderConfig::schema(), &config))
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = match ProviderConfig::from_value(config) {
            Ok(config) => config,
            Err(err) => {
                return Ok(vec![ProviderError::from(err)
                    .to_diagnostic("invalid provider configuration")])
            }
        };

        let acquirer = CredentialAcquirer::new(
            self.store.clone(),
            self.discovery.clone(),
            self.pairing.clone(),
            self.stop.subscribe(),
        );
        let creds = match acquirer.acquire(&config).await {
            Ok(creds) => creds,
            Err(err) => {
                error!(error = %err, "Credential acquisition failed");
                return Ok(vec![
                    ProviderError::from(err).to_diagnostic("failed to get auth config")
                ]);
            }
        };

        info!(
            bridge_ip = %creds.bridge_address,
            api_key = %mask(&creds.api_key),
            "Configuring Hue Bridge client"
        );

        let client = match (self.client_factory)(&creds) {
            Ok(client) => client,
            Err(err) => return Ok(vec![err.to_diagnostic("failed to create Hue client")]),
        };
        *self.client.write().await = Some(client);
        *self.credentials.write().await = Some(creds);

        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        info!("Stopping provider");
        self.stop.send_replace(true);
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validate(&resource.schema(), &config);
        diagnostics.extend(resource.validate(&config));
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state, _config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let plan = resources::plan(&resource.schema(), prior_state.as_ref(), proposed_state)?;
        debug!(
            changes = plan.changes.len(),
            requires_replace = plan.requires_replace,
            "Planned"
        );
        Ok(plan)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.create(client.as_ref(), planned_state).await
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.read(client.as_ref(), current_state).await
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.update(client.as_ref(), prior_state, planned_state).await
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.delete(client.as_ref(), current_state).await
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        Ok(validate(&data_source.schema(), &config))
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;
        data_source.read(client.as_ref(), config).await
    }

    #[instrument(skip(self, args))]
    async fn call_function(&self, name: &str, args: Vec<Value>) -> Result<Value, ProviderError> {
        let function = self.function(name)?;
        let diagnostics = validate_arguments(&function.definition(), &args);
        if !diagnostics.is_empty() {
            let summaries: Vec<_> = diagnostics.into_iter().map(|d| d.summary).collect();
            warn!(errors = summaries.len(), "Rejected function arguments");
            return Err(ProviderError::Validation(summaries.join("; ")));
        }
        function.call(&args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Environment;
    use crate::config::CACHE_FILE_NAME;
    use crate::testing::{
        assert_error_contains, assert_has_errors, assert_no_errors, FakeBridge, ScriptedPairing,
        StaticDiscovery,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Setup {
        _dir: TempDir,
        bridge: Arc<FakeBridge>,
        pairing: Arc<ScriptedPairing>,
        provider: Arc<HueProvider>,
    }

    fn setup(pairing: ScriptedPairing) -> Setup {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new()
            .with_cache_path(dir.path().join(CACHE_FILE_NAME))
            .with_environment(Environment::Fixed(HashMap::new()));
        let bridge = Arc::new(FakeBridge::new().with_light("l1", "Desk", false));
        let pairing = Arc::new(pairing);
        let provider = HueProvider::with_parts(
            store,
            Arc::new(StaticDiscovery::found("10.0.0.9")),
            pairing.clone(),
            FakeBridge::factory(&bridge),
        );
        Setup {
            _dir: dir,
            bridge,
            pairing,
            provider: Arc::new(provider),
        }
    }

    #[tokio::test]
    async fn test_metadata_lists_registrations() {
        let s = setup(ScriptedPairing::issuing("k"));
        let metadata = s.provider.metadata();

        assert_eq!(metadata.type_name, "openhue");
        assert_eq!(metadata.resources, vec!["openhue_light", "openhue_room"]);
        assert_eq!(metadata.data_sources, vec!["openhue_light"]);
        assert_eq!(metadata.functions, vec!["hextod65"]);
    }

    #[tokio::test]
    async fn test_crud_before_configure_fails() {
        let s = setup(ScriptedPairing::issuing("k"));
        let err = s
            .provider
            .read("openhue_light", json!({"id": "l1", "name": "Desk"}))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "client is nil");
    }

    #[tokio::test]
    async fn test_configure_with_explicit_credentials() {
        let s = setup(ScriptedPairing::issuing("unused"));
        let diagnostics = s
            .provider
            .configure(json!({"bridge_ip": "192.168.1.3", "bridge_api_key": "abc"}))
            .await
            .unwrap();
        assert_no_errors(&diagnostics);

        assert_eq!(
            s.provider.credentials().await,
            Some(BridgeCredentials::new("192.168.1.3", "abc"))
        );
        assert_eq!(s.pairing.calls(), 0);

        let state = s
            .provider
            .read("openhue_light", json!({"id": "l1", "name": "Desk"}))
            .await
            .unwrap();
        assert_eq!(state["name"], "Desk");
        assert_eq!(s.bridge.light_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configure_pairing_failure_reports_auth_diagnostic() {
        let s = setup(ScriptedPairing::new(vec![Err(
            crate::auth::PairingAttemptError::Rejected("bridge error 7: invalid value".into()),
        )]));

        let diagnostics = s.provider.configure(json!({})).await.unwrap();
        assert_has_errors(&diagnostics);
        assert_error_contains(&diagnostics, "failed to get auth config");
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("invalid value"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pairing() {
        let s = setup(ScriptedPairing::new(vec![]));
        let provider = s.provider.clone();
        let configure = tokio::spawn(async move { provider.configure(json!({})).await });

        tokio::time::sleep(Duration::from_secs(2)).await;
        s.provider.stop().await.unwrap();

        let diagnostics = configure.await.unwrap().unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("pairing with Hue Bridge was cancelled")
        );
        assert!(s.provider.credentials().await.is_none());
    }

    #[tokio::test]
    async fn test_configure_rejects_bad_config_shape() {
        let s = setup(ScriptedPairing::issuing("k"));
        let diagnostics = s.provider.configure(json!({"cache": "yes"})).await.unwrap();
        assert_error_contains(&diagnostics, "invalid provider configuration");
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let s = setup(ScriptedPairing::issuing("k"));

        let ok = s
            .provider
            .validate_resource_config("openhue_room", json!({"name": "Den", "archetype": "lounge"}))
            .await
            .unwrap();
        assert_no_errors(&ok);

        let bad = s
            .provider
            .validate_resource_config("openhue_room", json!({"name": "Den", "archetype": "cave"}))
            .await
            .unwrap();
        assert_error_contains(&bad, "invalid archetype cave");

        let err = s
            .provider
            .validate_resource_config("openhue_scene", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_call_function() {
        let s = setup(ScriptedPairing::issuing("k"));

        let value = s
            .provider
            .call_function("hextod65", vec![json!("#ff0000")])
            .await
            .unwrap();
        assert!(value["x"].as_f64().unwrap() > 0.6);

        let err = s.provider.call_function("hextod65", vec![]).await.unwrap_err();
        assert_eq!(err.message(), "Expected 1 argument(s), got 0");

        let err = s
            .provider
            .call_function("rgb", vec![json!("#fff")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }
}
