use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nostr::Keys;
use serde::{Deserialize, Serialize};
use strand_core::config::parse_relay_list;
use strand_core::CoreConfig;

/// Environment variable holding the account key when no config file
/// provides one.
pub const KEY_ENV: &str = "STRAND_KEY";

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Directory holding account storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Relays connected regardless of the account's relay list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priority_relays: Vec<String>,

    /// Endpoint serving the default relay list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_relays_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// nsec or hex secret key
    pub key: String,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Environment defaults, overridden by whatever the file sets.
    pub fn core_config(&self) -> CoreConfig {
        let mut config = CoreConfig::from_env();
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if !self.priority_relays.is_empty() {
            config.relay.priority_relays = parse_relay_list(&self.priority_relays.join(","));
        }
        if self.default_relays_url.is_some() {
            config.default_relays_url = self.default_relays_url.clone();
        }
        config
    }

    pub fn keys(&self) -> Result<Keys> {
        let key = match &self.credentials {
            Some(credentials) => credentials.key.clone(),
            None => std::env::var(KEY_ENV)
                .with_context(|| format!("No credentials in config and {} is not set", KEY_ENV))?,
        };
        Keys::parse(key.trim()).context("Failed to parse secret key")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_full() {
        let json = r#"{
            "dataDir": "/tmp/strand",
            "priorityRelays": ["wss://priority.example", "not a relay"],
            "defaultRelaysUrl": "https://example.com/relays.json",
            "credentials": { "key": "nsec1abc123" }
        }"#;
        let config: CliConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/strand")));
        assert_eq!(config.credentials.as_ref().unwrap().key, "nsec1abc123");

        let core = config.core_config();
        assert_eq!(core.data_dir, PathBuf::from("/tmp/strand"));
        assert_eq!(core.relay.priority_relays.len(), 1);
        assert_eq!(
            core.default_relays_url.as_deref(),
            Some("https://example.com/relays.json")
        );
    }

    #[test]
    fn test_parse_config_minimal() {
        let config: CliConfig = serde_json::from_str("{}").unwrap();
        assert!(config.data_dir.is_none());
        assert!(config.priority_relays.is_empty());
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_keys_from_credentials() {
        let keys = Keys::generate();
        let config = CliConfig {
            credentials: Some(Credentials {
                key: keys.secret_key().to_secret_hex(),
            }),
            ..Default::default()
        };
        assert_eq!(config.keys().unwrap().public_key(), keys.public_key());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = CliConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }
}
