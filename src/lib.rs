//! OpenHue Provider
//!
//! An infrastructure provider that manages Philips Hue rooms and lights
//! through the bridge's local CLIP v2 API.
//!
//! # Overview
//!
//! - **Credential acquisition**: explicit configuration, environment
//!   variables and an optional cache file are merged; a missing bridge
//!   address triggers local-network discovery and a missing API key starts
//!   link-button pairing
//! - **Resources**: `openhue_room` and `openhue_light`
//! - **Data sources**: `openhue_light`
//! - **Functions**: `hextod65`, hex colour to CIE xyY under D65
//! - **ProviderService trait**: the interface a host drives the provider through
//! - **Logging**: structured `tracing` output on stderr
//!
//! # Quick Start
//!
//! ```ignore
//! use openhue_provider::{HueProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     openhue_provider::init_logging();
//!
//!     let provider = HueProvider::new()?;
//!     let diagnostics = provider
//!         .configure(json!({"bridge_ip": "discover", "cache": true}))
//!         .await?;
//!     assert!(diagnostics.is_empty());
//!
//!     let light = provider
//!         .read_data_source("openhue_light", json!({"name": "Desk"}))
//!         .await?;
//!     println!("{}", light);
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! | Attribute        | Environment variable  | Cache key            |
//! |------------------|-----------------------|----------------------|
//! | `bridge_ip`      | `HUE_BRIDGE_IP`       | `hue_bridge_ip`      |
//! | `bridge_api_key` | `HUE_BRIDGE_API_KEY`  | `hue_bridge_api_key` |
//!
//! Explicit values win over the environment, which wins over the cache file
//! `~/.openhue-credentials.json` (read and written only when `cache = true`).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod functions;
pub mod hue;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use auth::{BridgeCredentials, CredentialAcquirer, CredentialStore};
pub use config::ProviderConfig;
pub use error::{AuthError, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::HueProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
