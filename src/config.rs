//! Provider configuration and fixed settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::schema::{Attribute, Schema};

/// Type name of the provider; resource and data source names are prefixed with it.
pub const PROVIDER_TYPE_NAME: &str = "openhue";

/// Value of `bridge_ip` that forces discovery even when an address is cached.
pub const DISCOVER_SENTINEL: &str = "discover";

/// Credential cache file name, relative to the user's home directory.
pub const CACHE_FILE_NAME: &str = ".openhue-credentials.json";

/// Key of the bridge address in the cache file and the environment.
pub const BRIDGE_IP_KEY: &str = "hue_bridge_ip";

/// Key of the API key in the cache file and the environment.
pub const BRIDGE_API_KEY_KEY: &str = "hue_bridge_api_key";

/// Upper bound for one discovery probe.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for the link button to be pressed.
pub const PAIRING_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay between two pairing requests.
pub const PAIRING_INTERVAL: Duration = Duration::from_millis(500);

/// Consecutive transport failures tolerated while pairing.
pub const PAIRING_MAX_TRANSIENT_FAILURES: u32 = 3;

/// Timeout applied to each bridge HTTP request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider configuration block.
///
/// Every field is optional: missing values come from the environment, the
/// credential cache, discovery or pairing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Bridge address, or [`DISCOVER_SENTINEL`] to always discover.
    #[serde(default)]
    pub bridge_ip: Option<String>,
    /// Application key issued by the bridge.
    #[serde(default)]
    pub bridge_api_key: Option<String>,
    /// Whether to read and write the credential cache file.
    #[serde(default)]
    pub cache: Option<bool>,
}

impl ProviderConfig {
    /// Parse a configuration value. Null is treated as an empty block.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
    }

    /// Whether the credential cache is enabled.
    pub fn cache_enabled(&self) -> bool {
        self.cache.unwrap_or(false)
    }

    /// Explicit bridge address, with empty strings treated as unset.
    pub fn explicit_bridge_ip(&self) -> Option<&str> {
        non_empty(self.bridge_ip.as_deref())
    }

    /// Explicit API key, with empty strings treated as unset.
    pub fn explicit_api_key(&self) -> Option<&str> {
        non_empty(self.bridge_api_key.as_deref())
    }

    /// Schema of the provider configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Manage Philips Hue rooms and lights through the bridge's local API")
            .with_attribute(
                "bridge_ip",
                Attribute::optional_string().with_description(
                    "The IP address of the Hue bridge. If not provided, or set to \"discover\", \
                     the provider will attempt to discover one on the local network.",
                ),
            )
            .with_attribute(
                "bridge_api_key",
                Attribute::optional_string().sensitive().with_description(
                    "The API key for the Hue bridge. If not provided, the provider will attempt \
                     to create one; press the link button on the bridge to authenticate.",
                ),
            )
            .with_attribute(
                "cache",
                Attribute::optional_bool().with_description(
                    "Whether to cache the bridge IP and API key in the user's home directory so \
                     discovery and pairing are skipped on subsequent runs.",
                ),
            )
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
