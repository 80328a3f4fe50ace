//! Credential acquisition.
//!
//! [`CredentialAcquirer::acquire`] merges explicit configuration, environment
//! and the on-disk cache, discovers the bridge when no address is known,
//! pairs with it when no API key is known, and writes the result back to the
//! cache.

pub mod locator;
pub mod pairing;
pub mod store;

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::config::ProviderConfig;
use crate::error::AuthError;
use crate::logging::mask;

pub use locator::{BridgeDiscovery, BridgeLocator, DiscoveredBridge, NetworkDiscovery};
pub use pairing::{
    BridgeAuthenticator, PairingAttempt, PairingAttemptError, PairingClient, PairingState,
    PairingStatus, PairingWaiter,
};
pub use store::{CachedCredentialRecord, CredentialStore, Environment, PartialCredentials};

/// Address and API key of one bridge.
#[derive(Clone, PartialEq, Eq)]
pub struct BridgeCredentials {
    /// Bridge network address.
    pub bridge_address: String,
    /// Application key issued by the bridge.
    pub api_key: String,
}

impl BridgeCredentials {
    /// Create credentials.
    pub fn new(bridge_address: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            bridge_address: bridge_address.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for BridgeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeCredentials")
            .field("bridge_address", &self.bridge_address)
            .field("api_key", &mask(&self.api_key))
            .finish()
    }
}

/// Runs the store, locator and pairing waiter in order.
#[derive(Clone)]
pub struct CredentialAcquirer {
    store: CredentialStore,
    discovery: Arc<dyn BridgeDiscovery>,
    pairing: Arc<dyn PairingClient>,
    cancel: watch::Receiver<bool>,
}

impl CredentialAcquirer {
    /// Create an acquirer. `cancel` aborts a pending pairing when set to true.
    pub fn new(
        store: CredentialStore,
        discovery: Arc<dyn BridgeDiscovery>,
        pairing: Arc<dyn PairingClient>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            discovery,
            pairing,
            cancel,
        }
    }

    /// Resolve complete credentials for `config`.
    #[instrument(skip_all, fields(cache = config.cache_enabled()))]
    pub async fn acquire(&self, config: &ProviderConfig) -> Result<BridgeCredentials, AuthError> {
        let cache_enabled = config.cache_enabled();
        if cache_enabled && self.store.cache_path().is_none() {
            warn!("No home directory found, credential cache disabled");
        }

        let partial = self.store.load(
            cache_enabled,
            config.explicit_bridge_ip(),
            config.explicit_api_key(),
        );
        debug!(
            bridge_ip = partial.bridge_address.as_deref().unwrap_or("-"),
            api_key = %mask(partial.api_key.as_deref().unwrap_or_default()),
            "Loaded credentials"
        );

        let bridge_address = BridgeLocator::new(self.discovery.as_ref())
            .locate(partial.bridge_address.as_deref())
            .await?;

        let api_key = match partial.api_key {
            Some(key) => key,
            None => {
                info!(bridge_ip = %bridge_address, "No API key known, pairing with bridge");
                PairingWaiter::new(self.pairing.as_ref(), self.cancel.clone())
                    .wait(&bridge_address)
                    .await?
            }
        };

        let creds = BridgeCredentials::new(bridge_address, api_key);
        if let Err(err) = self.store.save(cache_enabled, &creds) {
            warn!(error = %err, "Could not cache credentials");
        }

        Ok(creds)
    }
}
