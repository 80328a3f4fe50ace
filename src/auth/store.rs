//! Credential cache backed by a JSON file in the user's home directory.
//!
//! Each credential field resolves independently:
//! explicit configuration > environment variable > cache file > unset.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BridgeCredentials;
use crate::config::{non_empty, BRIDGE_API_KEY_KEY, BRIDGE_IP_KEY, CACHE_FILE_NAME};
use crate::error::AuthError;

/// Source of environment overrides.
#[derive(Debug, Clone, Default)]
pub enum Environment {
    /// Read from the process environment.
    #[default]
    Process,
    /// A fixed set of variables, for tests and embedding.
    Fixed(HashMap<String, String>),
}

impl Environment {
    /// Look up `key`, trying the upper-cased name first.
    pub fn get(&self, key: &str) -> Option<String> {
        let upper = key.to_ascii_uppercase();
        self.lookup(&upper)
            .or_else(|| self.lookup(key))
            .filter(|value| !value.is_empty())
    }

    fn lookup(&self, name: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(name).ok(),
            Self::Fixed(vars) => vars.get(name).cloned(),
        }
    }
}

/// On-disk shape of the cache file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredentialRecord {
    /// Cached bridge address.
    #[serde(rename = "hue_bridge_ip", default, skip_serializing_if = "Option::is_none")]
    pub bridge_ip: Option<String>,
    /// Cached API key.
    #[serde(
        rename = "hue_bridge_api_key",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<String>,
}

/// Credentials merged from every source; either field may still be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialCredentials {
    /// Resolved bridge address.
    pub bridge_address: Option<String>,
    /// Resolved API key.
    pub api_key: Option<String>,
}

/// Reads and writes the credential cache and applies overrides.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    cache_path: Option<PathBuf>,
    env: Environment,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// Store using `~/.openhue-credentials.json` and the process environment.
    pub fn new() -> Self {
        Self {
            cache_path: dirs::home_dir().map(|home| home.join(CACHE_FILE_NAME)),
            env: Environment::Process,
        }
    }

    /// Use a specific cache file.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Use a specific environment source.
    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Location of the cache file, if a home directory was found.
    pub fn cache_path(&self) -> Option<&Path> {
        self.cache_path.as_deref()
    }

    /// Merge explicit values, environment overrides and (optionally) the cache.
    ///
    /// Never fails: an absent or unreadable cache contributes nothing.
    pub fn load(
        &self,
        cache_enabled: bool,
        explicit_address: Option<&str>,
        explicit_api_key: Option<&str>,
    ) -> PartialCredentials {
        let cached = if cache_enabled {
            self.read_cache().unwrap_or_else(|err| {
                debug!(error = %err, "Ignoring credential cache");
                CachedCredentialRecord::default()
            })
        } else {
            CachedCredentialRecord::default()
        };

        PartialCredentials {
            bridge_address: self.resolve(explicit_address, BRIDGE_IP_KEY, cached.bridge_ip),
            api_key: self.resolve(explicit_api_key, BRIDGE_API_KEY_KEY, cached.api_key),
        }
    }

    fn resolve(&self, explicit: Option<&str>, key: &str, cached: Option<String>) -> Option<String> {
        non_empty(explicit)
            .map(str::to_string)
            .or_else(|| self.env.get(key))
            .or_else(|| cached.filter(|v| !v.is_empty()))
    }

    /// Read the cache file.
    pub fn read_cache(&self) -> Result<CachedCredentialRecord, AuthError> {
        let path = self.cache_path.as_deref().ok_or_else(|| AuthError::CacheRead {
            path: PathBuf::from(CACHE_FILE_NAME),
            reason: "home directory unavailable".to_string(),
        })?;

        let contents = std::fs::read_to_string(path).map_err(|e| AuthError::CacheRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&contents).map_err(|e| AuthError::CacheRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Persist credentials when caching is enabled; a no-op otherwise.
    pub fn save(&self, cache_enabled: bool, creds: &BridgeCredentials) -> Result<(), AuthError> {
        if !cache_enabled {
            return Ok(());
        }

        let path = self.cache_path.as_deref().ok_or_else(|| AuthError::CacheWrite {
            path: PathBuf::from(CACHE_FILE_NAME),
            reason: "home directory unavailable".to_string(),
        })?;
        let write_err = |reason: String| AuthError::CacheWrite {
            path: path.to_path_buf(),
            reason,
        };

        let record = CachedCredentialRecord {
            bridge_ip: Some(creds.bridge_address.clone()),
            api_key: Some(creds.api_key.clone()),
        };
        let mut contents =
            serde_json::to_string_pretty(&record).map_err(|e| write_err(e.to_string()))?;
        contents.push('\n');

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path).map_err(|e| write_err(e.to_string()))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| write_err(e.to_string()))?;

        debug!(path = %path.display(), "Wrote credential cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        Environment::Fixed(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn write_cache(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join(CACHE_FILE_NAME);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_precedence_explicit_env_cache() {
        let dir = TempDir::new().unwrap();
        let path = write_cache(
            &dir,
            r#"{"hue_bridge_ip": "Z", "hue_bridge_api_key": "key-z"}"#,
        );
        let store = CredentialStore::new()
            .with_cache_path(&path)
            .with_environment(env(&[("HUE_BRIDGE_IP", "Y")]));

        let creds = store.load(true, Some("X"), None);
        assert_eq!(creds.bridge_address.as_deref(), Some("X"));

        let creds = store.load(true, None, None);
        assert_eq!(creds.bridge_address.as_deref(), Some("Y"));

        let store = store.with_environment(env(&[]));
        let creds = store.load(true, None, None);
        assert_eq!(creds.bridge_address.as_deref(), Some("Z"));
        assert_eq!(creds.api_key.as_deref(), Some("key-z"));
    }

    #[test]
    fn test_cache_ignored_when_disabled() {
        let dir = TempDir::new().unwrap();
        let path = write_cache(
            &dir,
            r#"{"hue_bridge_ip": "10.0.0.2", "hue_bridge_api_key": "k"}"#,
        );
        let store = CredentialStore::new()
            .with_cache_path(&path)
            .with_environment(env(&[]));

        assert_eq!(store.load(false, None, None), PartialCredentials::default());
    }

    #[test]
    fn test_missing_or_malformed_cache_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new()
            .with_cache_path(dir.path().join("absent.json"))
            .with_environment(env(&[]));
        assert_eq!(store.load(true, None, None), PartialCredentials::default());
        assert!(matches!(store.read_cache(), Err(AuthError::CacheRead { .. })));

        let path = write_cache(&dir, "{ not json");
        let store = store.with_cache_path(path);
        assert_eq!(store.load(true, None, None), PartialCredentials::default());
    }

    #[test]
    fn test_lowercase_env_and_empty_values() {
        let store = CredentialStore::new().with_environment(env(&[
            ("hue_bridge_api_key", "lower"),
            ("HUE_BRIDGE_IP", ""),
        ]));

        let creds = store.load(false, Some(""), None);
        assert_eq!(creds.bridge_address, None);
        assert_eq!(creds.api_key.as_deref(), Some("lower"));
    }

    #[test]
    fn test_env_prefers_uppercase_name() {
        let env = env(&[("HUE_BRIDGE_IP", "upper"), ("hue_bridge_ip", "lower")]);
        assert_eq!(env.get("hue_bridge_ip").as_deref(), Some("upper"));
        assert_eq!(env.get("hue_bridge_api_key"), None);
    }

    #[test]
    fn test_save_round_trips_through_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);
        let store = CredentialStore::new()
            .with_cache_path(&path)
            .with_environment(env(&[]));

        let creds = BridgeCredentials::new("192.168.1.7", "abc123");
        store.save(true, &creds).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["hue_bridge_ip"], "192.168.1.7");
        assert_eq!(raw["hue_bridge_api_key"], "abc123");

        let loaded = store.load(true, None, None);
        assert_eq!(loaded.bridge_address.as_deref(), Some("192.168.1.7"));
        assert_eq!(loaded.api_key.as_deref(), Some("abc123"));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);
        let store = CredentialStore::new().with_cache_path(&path);
        store
            .save(true, &BridgeCredentials::new("10.0.0.1", "k"))
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_save_disabled_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);
        let store = CredentialStore::new().with_cache_path(&path);

        store
            .save(false, &BridgeCredentials::new("10.0.0.1", "k"))
            .unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let store =
            CredentialStore::new().with_cache_path(dir.path().join("missing").join("creds.json"));

        let err = store
            .save(true, &BridgeCredentials::new("10.0.0.1", "k"))
            .unwrap_err();
        assert!(matches!(err, AuthError::CacheWrite { .. }));
        assert!(!err.is_fatal());
    }
}
