//! Error types for the Hue provider.

use std::path::PathBuf;

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors raised while acquiring bridge credentials.
///
/// Only [`AuthError::Discovery`] and the pairing variants abort provider
/// configuration. The cache variants are logged and swallowed by the caller.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bridge could be found, or the discovery transport failed.
    #[error("failed to discover Hue Bridge: {0}")]
    Discovery(String),

    /// The link button was not pressed before the pairing deadline.
    #[error("timed out waiting for Hue Bridge to be authenticated")]
    PairingTimeout,

    /// The bridge rejected pairing for a reason other than the link button.
    #[error("failed to authenticate with Hue Bridge: {0}")]
    PairingFailed(String),

    /// The provider was stopped while pairing was still pending.
    #[error("pairing with Hue Bridge was cancelled")]
    PairingCancelled,

    /// The credential cache could not be read or parsed.
    #[error("failed to read credential cache {path}: {reason}")]
    CacheRead {
        /// Location of the cache file.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// The credential cache could not be written.
    #[error("failed to write credential cache {path}: {reason}")]
    CacheWrite {
        /// Location of the cache file.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },
}

impl AuthError {
    /// Whether this error must abort provider configuration.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CacheRead { .. } | Self::CacheWrite { .. })
    }
}

/// Errors that can occur while serving provider requests.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object was not found on the bridge.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource, data source or function is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request to the bridge could not be completed.
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge answered with an unexpected status.
    #[error("Bridge returned {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or error descriptions.
        body: String,
    },

    /// Credential acquisition failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ProviderError {
    /// Get the error message as a string.
    ///
    /// Returns the inner message for the string-carrying variants and the
    /// full display text for the wrapped ones.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg) => msg.clone(),
            Self::Api { body, .. } => body.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Http(err) => err.to_string(),
            Self::Auth(err) => err.to_string(),
        }
    }

    /// Convert this error into an error diagnostic with a short summary.
    pub fn to_diagnostic(&self, summary: impl Into<String>) -> Diagnostic {
        Diagnostic::error(summary).with_detail(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("light-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: light-123");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("openhue_scene".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: openhue_scene");

        let err = ProviderError::Api {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(format!("{}", err), "Bridge returned 404: not found");
    }

    #[test]
    fn test_auth_error_display() {
        let err = AuthError::Discovery("no bridge answered".to_string());
        assert_eq!(
            err.to_string(),
            "failed to discover Hue Bridge: no bridge answered"
        );

        assert_eq!(
            AuthError::PairingTimeout.to_string(),
            "timed out waiting for Hue Bridge to be authenticated"
        );
    }

    #[test]
    fn test_auth_error_fatality() {
        assert!(AuthError::PairingTimeout.is_fatal());
        assert!(AuthError::PairingFailed("bad".into()).is_fatal());
        assert!(AuthError::Discovery("none".into()).is_fatal());
        assert!(!AuthError::CacheWrite {
            path: PathBuf::from("/nope"),
            reason: "read-only".into(),
        }
        .is_fatal());
    }

    #[test]
    fn test_auth_error_wraps_transparently() {
        let err: ProviderError = AuthError::PairingTimeout.into();
        assert_eq!(
            err.to_string(),
            "timed out waiting for Hue Bridge to be authenticated"
        );
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::Configuration("client is nil".to_string());
        assert_eq!(err.message(), "client is nil");

        let err = ProviderError::Api {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn test_to_diagnostic() {
        let diag = ProviderError::NotFound("light x".into()).to_diagnostic("failed to find light");
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.summary, "failed to find light");
        assert_eq!(diag.detail.as_deref(), Some("Resource not found: light x"));
    }
}
