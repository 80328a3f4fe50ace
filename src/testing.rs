//! Testing utilities.
//!
//! [`ProviderTester`] drives any [`ProviderService`] without a host.
//! [`FakeBridge`], [`StaticDiscovery`] and [`ScriptedPairing`] stand in for
//! the bridge, the network probe and the link-button handshake so the
//! provider can be exercised end to end in memory.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use openhue_provider::testing::{FakeBridge, ProviderTester, ScriptedPairing, StaticDiscovery};
//! use openhue_provider::{CredentialStore, HueProvider};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_adopt_light() {
//!     let bridge = Arc::new(FakeBridge::new().with_light("l1", "Desk", false));
//!     let provider = HueProvider::with_parts(
//!         CredentialStore::new(),
//!         Arc::new(StaticDiscovery::found("10.0.0.2")),
//!         Arc::new(ScriptedPairing::issuing("key")),
//!         FakeBridge::factory(&bridge),
//!     );
//!     let tester = ProviderTester::new(provider);
//!
//!     tester.configure(json!({"bridge_api_key": "key"})).await.unwrap();
//!     let state = tester.lifecycle_create("openhue_light", json!({"name": "Desk"})).await.unwrap();
//!     assert_eq!(state["id"], "l1");
//! }
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::{
    BridgeCredentials, BridgeDiscovery, DiscoveredBridge, PairingAttemptError, PairingClient,
    PairingStatus,
};
use crate::error::{AuthError, ProviderError};
use crate::hue::{
    HueApi, LightGet, LightMetadata, LightPut, On, ResourceIdentifier, RoomGet, RoomPut,
};
use crate::provider::ClientFactory;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::types::PlanResult;

/// A test harness for provider implementations.
///
/// This wraps a `ProviderService` implementation and provides
/// simplified methods for testing without a host process.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the diagnostics if there are errors.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    ///
    /// Returns `Err` with the diagnostics if there are errors.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    // =========================================================================
    // Data Sources & Functions
    // =========================================================================

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read data from a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Call a provider function.
    pub async fn call_function(&self, name: &str, args: Vec<Value>) -> Result<Value, ProviderError> {
        self.provider.call_function(name, args).await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run plan → create → read and return the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Run plan → update → read and return the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Run plan → delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let plan = self
            .plan_delete(resource_type, current_state.clone())
            .await?;
        assert!(plan.is_destroy(), "Expected a destroy plan");
        self.delete(resource_type, current_state).await
    }

    /// Run create → update → delete and return the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone())
            .await?;
        Ok(updated)
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Test Doubles
// =========================================================================

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct BridgeState {
    lights: Vec<LightGet>,
    rooms: BTreeMap<String, RoomGet>,
    light_updates: Vec<(String, LightPut)>,
    next_room: u64,
}

/// In-memory bridge holding lights and rooms.
#[derive(Default)]
pub struct FakeBridge {
    state: Mutex<BridgeState>,
}

impl FakeBridge {
    /// An empty bridge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a light.
    pub fn with_light(self, id: &str, name: &str, on: bool) -> Self {
        lock(&self.state).lights.push(LightGet {
            id: id.to_string(),
            metadata: LightMetadata {
                name: name.to_string(),
                archetype: None,
            },
            on: On { on },
            dimming: None,
            color: None,
        });
        self
    }

    /// A client factory handing out this bridge.
    pub fn factory(bridge: &Arc<FakeBridge>) -> ClientFactory {
        let bridge = Arc::clone(bridge);
        Arc::new(
            move |_: &BridgeCredentials| -> Result<Arc<dyn HueApi>, ProviderError> {
                Ok(bridge.clone())
            },
        )
    }

    /// Current state of a light.
    pub fn light(&self, id: &str) -> Option<LightGet> {
        lock(&self.state).lights.iter().find(|l| l.id == id).cloned()
    }

    /// Number of lights.
    pub fn light_count(&self) -> usize {
        lock(&self.state).lights.len()
    }

    /// Last body sent to `PUT light/{id}`.
    pub fn last_light_update(&self, id: &str) -> Option<LightPut> {
        lock(&self.state)
            .light_updates
            .iter()
            .rev()
            .find(|(light_id, _)| light_id == id)
            .map(|(_, body)| body.clone())
    }

    /// Current state of a room.
    pub fn room(&self, id: &str) -> Option<RoomGet> {
        lock(&self.state).rooms.get(id).cloned()
    }

    /// Number of rooms.
    pub fn room_count(&self) -> usize {
        lock(&self.state).rooms.len()
    }
}

fn not_found(kind: &str, id: &str) -> ProviderError {
    ProviderError::NotFound(format!("{} {}", kind, id))
}

#[async_trait]
impl HueApi for FakeBridge {
    async fn list_lights(&self) -> Result<Vec<LightGet>, ProviderError> {
        Ok(lock(&self.state).lights.clone())
    }

    async fn get_light(&self, id: &str) -> Result<LightGet, ProviderError> {
        self.light(id).ok_or_else(|| not_found("light", id))
    }

    async fn update_light(
        &self,
        id: &str,
        body: &LightPut,
    ) -> Result<Vec<ResourceIdentifier>, ProviderError> {
        let mut state = lock(&self.state);
        let light = state
            .lights
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| not_found("light", id))?;

        if let Some(on) = body.on {
            light.on = on;
        }
        if body.dimming.is_some() {
            light.dimming = body.dimming;
        }
        if body.color.is_some() {
            light.color = body.color;
        }
        state.light_updates.push((id.to_string(), body.clone()));

        Ok(vec![ResourceIdentifier {
            rid: id.to_string(),
            rtype: "light".to_string(),
        }])
    }

    async fn create_room(&self, body: &RoomPut) -> Result<ResourceIdentifier, ProviderError> {
        let mut state = lock(&self.state);
        state.next_room += 1;
        let id = format!("room-{}", state.next_room);
        state.rooms.insert(
            id.clone(),
            RoomGet {
                id: id.clone(),
                metadata: body.metadata.clone(),
                children: body.children.clone(),
            },
        );
        Ok(ResourceIdentifier {
            rid: id,
            rtype: "room".to_string(),
        })
    }

    async fn get_room(&self, id: &str) -> Result<RoomGet, ProviderError> {
        self.room(id).ok_or_else(|| not_found("room", id))
    }

    async fn update_room(
        &self,
        id: &str,
        body: &RoomPut,
    ) -> Result<Vec<ResourceIdentifier>, ProviderError> {
        let mut state = lock(&self.state);
        let room = state.rooms.get_mut(id).ok_or_else(|| not_found("room", id))?;
        room.metadata = body.metadata.clone();
        room.children = body.children.clone();
        Ok(vec![ResourceIdentifier {
            rid: id.to_string(),
            rtype: "room".to_string(),
        }])
    }

    async fn delete_room(&self, id: &str) -> Result<(), ProviderError> {
        lock(&self.state)
            .rooms
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("room", id))
    }
}

/// Discovery returning a fixed answer and counting calls.
pub struct StaticDiscovery {
    result: Result<String, String>,
    calls: AtomicUsize,
}

impl StaticDiscovery {
    /// Always finds a bridge at `address`.
    pub fn found(address: &str) -> Self {
        Self {
            result: Ok(address.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails with `reason`.
    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of discovery probes run.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BridgeDiscovery for StaticDiscovery {
    async fn discover(&self, _timeout: Duration) -> Result<DiscoveredBridge, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(address) => Ok(DiscoveredBridge {
                address: address.clone(),
                instance: None,
            }),
            Err(reason) => Err(AuthError::Discovery(reason.clone())),
        }
    }
}

/// Pairing client replaying a script of responses.
///
/// Once the script is exhausted every request reports the link button as
/// not pressed.
pub struct ScriptedPairing {
    script: Mutex<VecDeque<Result<PairingStatus, PairingAttemptError>>>,
    calls: AtomicUsize,
}

impl ScriptedPairing {
    /// Replay `script` in order.
    pub fn new(script: Vec<Result<PairingStatus, PairingAttemptError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Issue `key` on the first request.
    pub fn issuing(key: &str) -> Self {
        Self::new(vec![Ok(PairingStatus::Issued(key.to_string()))])
    }

    /// Number of pairing requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PairingClient for ScriptedPairing {
    async fn request_key(
        &self,
        _bridge_address: &str,
    ) -> Result<PairingStatus, PairingAttemptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.script)
            .pop_front()
            .unwrap_or(Ok(PairingStatus::LinkButtonNotPressed))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan result indicates the resource will be created.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to create, not replace"
    );
}

/// Assert that a plan result indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan does not require resource replacement.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan has a change for a specific attribute path.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan does not have a change for a specific attribute path.
///
/// # Panics
///
/// Panics if the plan has a change for the given path.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !plan.changes.iter().any(|c| c.path == path),
        "Expected plan to not change attribute '{}', but it was changed",
        path
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "Expected at least one error, but got none"
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
