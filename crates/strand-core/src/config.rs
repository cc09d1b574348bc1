use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{DATA_DIR_ENV, DEFAULT_RELAYS_URL_ENV, FETCH_TIMEOUT, PRIORITY_RELAYS_ENV};
use crate::relay::{RelayOptions, RelayUrl};

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    pub relay: RelayOptions,
    /// Upper bound on a single REQ→EOSE round-trip made by the account layer.
    pub fetch_timeout: Duration,
    /// Endpoint serving the platform default relay list (JSON).
    pub default_relays_url: Option<String>,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            relay: RelayOptions::default(),
            fetch_timeout: FETCH_TIMEOUT,
            default_relays_url: None,
        }
    }

    /// Build a config from the process environment.
    ///
    /// `STRAND_PRIORITY_RELAYS` is a comma-separated list of relays that are
    /// always connected regardless of the account's relay settings. Entries
    /// that are not valid relay URLs are skipped with a warning.
    pub fn from_env() -> Self {
        let data_dir = std::env::var(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let mut config = Self::new(data_dir);
        if let Ok(list) = std::env::var(PRIORITY_RELAYS_ENV) {
            config.relay.priority_relays = parse_relay_list(&list);
        }
        config.default_relays_url = std::env::var(DEFAULT_RELAYS_URL_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty());
        config
    }

    pub fn with_priority_relays(mut self, relays: Vec<RelayUrl>) -> Self {
        self.relay.priority_relays = relays;
        self
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage")
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(default_data_dir())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("strand"))
        .unwrap_or_else(|| PathBuf::from("strand_data"))
}

/// Parse a comma-separated relay list, dropping blanks and invalid URLs.
pub fn parse_relay_list(list: &str) -> Vec<RelayUrl> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match RelayUrl::parse(s) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("ignoring priority relay {:?}: {}", s, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relay_list_skips_blank_and_invalid() {
        let relays = parse_relay_list(" wss://a.example , ,https://nope.example,wss://b.example/");
        let urls: Vec<&str> = relays.iter().map(|u| u.as_str()).collect();
        assert_eq!(urls, vec!["wss://a.example", "wss://b.example"]);
    }

    #[test]
    fn test_storage_dir_is_under_data_dir() {
        let config = CoreConfig::new("/tmp/strand-test");
        assert_eq!(
            config.storage_dir(),
            PathBuf::from("/tmp/strand-test/storage")
        );
    }
}
