//! Logging setup for the provider.
//!
//! Logs go to **stderr** through a `tracing` subscriber. The host owns stdout,
//! and the pairing loop prints its "press the button" prompts as log lines.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `openhue_provider=debug`)
//!
//! ```bash
//! # Follow discovery and pairing in detail
//! RUST_LOG=openhue_provider=debug terraform apply
//! ```

use tracing_subscriber::{fmt, prelude::*, registry::Registry, EnvFilter, Layer};

/// Initialize the default logging subscriber.
///
/// Respects `RUST_LOG` and falls back to `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level used when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(stderr_layer(default_level))
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Useful in tests, where several cases may race to install a subscriber.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(stderr_layer("info"))
        .try_init()
        .is_ok()
}

fn stderr_layer(default_level: &str) -> impl Layer<Registry> + Send + Sync {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(filter)
}

/// Mask a secret for inclusion in a log field.
///
/// Keeps the first four characters of long values so operators can tell keys
/// apart; short or empty values are masked completely.
pub fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    match secret.char_indices().nth(4) {
        Some((idx, _)) if secret.chars().count() > 8 => format!("{}***", &secret[..idx]),
        _ => "***".to_string(),
    }
}
