//! Bridge address resolution and local-network discovery.

use std::time::Duration;

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::{non_empty, DISCOVERY_TIMEOUT, DISCOVER_SENTINEL};
use crate::error::AuthError;

const HUE_SERVICE_TYPE: &str = "_hue._tcp.local.";
const DISCOVERY_PORTAL_URL: &str = "https://discovery.meethue.com/";

/// A bridge found on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredBridge {
    /// Address to reach the bridge at.
    pub address: String,
    /// Bridge identifier or mDNS instance name, when known.
    pub instance: Option<String>,
}

/// A way of finding a bridge on the local network.
#[async_trait]
pub trait BridgeDiscovery: Send + Sync {
    /// Find one bridge within `timeout`.
    async fn discover(&self, timeout: Duration) -> Result<DiscoveredBridge, AuthError>;
}

/// Resolves the bridge address from configuration or discovery.
pub struct BridgeLocator<'a> {
    discovery: &'a dyn BridgeDiscovery,
}

impl<'a> BridgeLocator<'a> {
    /// Create a locator backed by `discovery`.
    pub fn new(discovery: &'a dyn BridgeDiscovery) -> Self {
        Self { discovery }
    }

    /// Return `explicit_address` unless it is missing, empty or the
    /// `"discover"` sentinel, in which case run one discovery probe.
    pub async fn locate(&self, explicit_address: Option<&str>) -> Result<String, AuthError> {
        match non_empty(explicit_address) {
            Some(address) if address != DISCOVER_SENTINEL => Ok(address.to_string()),
            _ => {
                let bridge = self.discovery.discover(DISCOVERY_TIMEOUT).await?;
                info!(
                    bridge_ip = %bridge.address,
                    instance = bridge.instance.as_deref().unwrap_or("-"),
                    "Discovered Hue Bridge"
                );
                Ok(bridge.address)
            }
        }
    }
}

/// Discovery over mDNS with the Hue discovery portal as fallback.
#[derive(Debug, Clone)]
pub struct NetworkDiscovery {
    http: reqwest::Client,
    portal_url: String,
}

impl NetworkDiscovery {
    /// Create a discovery client using the public Hue portal.
    pub fn new() -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AuthError::Discovery(e.to_string()))?;
        Ok(Self {
            http,
            portal_url: DISCOVERY_PORTAL_URL.to_string(),
        })
    }

    async fn discover_mdns(&self, timeout: Duration) -> Result<DiscoveredBridge, AuthError> {
        tokio::task::spawn_blocking(move || browse_mdns(timeout))
            .await
            .map_err(|e| AuthError::Discovery(format!("mDNS browse task failed: {}", e)))?
    }

    async fn discover_portal(&self, timeout: Duration) -> Result<DiscoveredBridge, AuthError> {
        let entries: Vec<PortalEntry> = self
            .http
            .get(&self.portal_url)
            .timeout(timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::Discovery(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::Discovery(format!("invalid portal response: {}", e)))?;

        pick_portal_entry(entries)
    }
}

#[async_trait]
impl BridgeDiscovery for NetworkDiscovery {
    #[instrument(skip(self))]
    async fn discover(&self, timeout: Duration) -> Result<DiscoveredBridge, AuthError> {
        let started = Instant::now();
        let mdns_budget = timeout.mul_f32(0.6);

        match self.discover_mdns(mdns_budget).await {
            Ok(bridge) => return Ok(bridge),
            Err(err) => debug!(error = %err, "mDNS discovery found nothing, trying portal"),
        }

        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(AuthError::Discovery("no bridge found before timeout".to_string()));
        }
        self.discover_portal(remaining).await.map_err(|err| {
            warn!(error = %err, "Bridge discovery failed");
            err
        })
    }
}

fn browse_mdns(timeout: Duration) -> Result<DiscoveredBridge, AuthError> {
    let daemon = ServiceDaemon::new().map_err(|e| AuthError::Discovery(e.to_string()))?;
    let receiver = daemon
        .browse(HUE_SERVICE_TYPE)
        .map_err(|e| AuthError::Discovery(e.to_string()))?;

    let deadline = std::time::Instant::now() + timeout;
    let mut found = None;

    while found.is_none() {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match receiver.recv_timeout(remaining) {
            Ok(ServiceEvent::ServiceResolved(info)) => {
                let addresses: Vec<String> =
                    info.get_addresses().iter().map(|addr| addr.to_string()).collect();
                found = preferred_address(&addresses).map(|address| DiscoveredBridge {
                    address,
                    instance: Some(info.get_fullname().to_string()),
                });
            }
            Ok(ServiceEvent::SearchStopped(_)) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    let _ = daemon.shutdown();
    found.ok_or_else(|| AuthError::Discovery("no bridge answered mDNS query".to_string()))
}

/// First IPv4 address, or any address when none is IPv4.
fn preferred_address(addresses: &[String]) -> Option<String> {
    addresses
        .iter()
        .find(|addr| !addr.contains(':'))
        .or_else(|| addresses.first())
        .cloned()
}

#[derive(Debug, Deserialize)]
struct PortalEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "internalipaddress")]
    internal_ip_address: String,
}

fn pick_portal_entry(entries: Vec<PortalEntry>) -> Result<DiscoveredBridge, AuthError> {
    entries
        .into_iter()
        .find(|entry| !entry.internal_ip_address.is_empty())
        .map(|entry| DiscoveredBridge {
            address: entry.internal_ip_address,
            instance: entry.id,
        })
        .ok_or_else(|| AuthError::Discovery("discovery portal returned no bridges".to_string()))
}
