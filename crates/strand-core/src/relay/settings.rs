//! Relay URLs and per-account relay settings.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::RelayError;

/// Normalized relay URL (`ws://` or `wss://`, no trailing slash).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelayUrl(String);

impl RelayUrl {
    pub fn parse(url: &str) -> Result<Self, RelayError> {
        let trimmed = url.trim().trim_end_matches('/');
        let lower = trimmed.to_ascii_lowercase();

        let rest = if let Some(rest) = lower.strip_prefix("wss://") {
            rest
        } else if let Some(rest) = lower.strip_prefix("ws://") {
            rest
        } else {
            return Err(RelayError::InvalidUrl {
                url: url.to_string(),
                reason: "scheme must be ws:// or wss://",
            });
        };

        if rest.is_empty() || rest.contains(char::is_whitespace) {
            return Err(RelayError::InvalidUrl {
                url: url.to_string(),
                reason: "missing or malformed host",
            });
        }

        // Scheme and host are case-insensitive, the path is not.
        let scheme_len = lower.len() - rest.len();
        let host_end = rest.find('/').map(|i| scheme_len + i).unwrap_or(lower.len());
        let normalized = format!("{}{}", &lower[..host_end], &trimmed[host_end..]);
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelayUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RelayUrl {
    type Error = RelayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RelayUrl> for String {
    fn from(url: RelayUrl) -> Self {
        url.0
    }
}

/// Read/write permissions for one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPolicy {
    pub read: bool,
    pub write: bool,
}

impl RelayPolicy {
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };

    pub fn new(read: bool, write: bool) -> Self {
        Self { read, write }
    }
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self::READ_WRITE
    }
}

/// Mapping from relay URL to permissions, persisted per account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelaySettings(BTreeMap<RelayUrl, RelayPolicy>);

impl RelaySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_urls<I>(urls: I) -> Self
    where
        I: IntoIterator<Item = RelayUrl>,
    {
        Self(
            urls.into_iter()
                .map(|url| (url, RelayPolicy::READ_WRITE))
                .collect(),
        )
    }

    pub fn insert(&mut self, url: RelayUrl, policy: RelayPolicy) -> Option<RelayPolicy> {
        self.0.insert(url, policy)
    }

    pub fn remove(&mut self, url: &RelayUrl) -> Option<RelayPolicy> {
        self.0.remove(url)
    }

    pub fn get(&self, url: &RelayUrl) -> Option<RelayPolicy> {
        self.0.get(url).copied()
    }

    pub fn contains(&self, url: &RelayUrl) -> bool {
        self.0.contains_key(url)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RelayUrl, &RelayPolicy)> {
        self.0.iter()
    }

    pub fn urls(&self) -> impl Iterator<Item = &RelayUrl> {
        self.0.keys()
    }

    /// Merge `other` into a copy of `self`. Permissions of URLs present in
    /// both are OR-ed together.
    pub fn merged(&self, other: &RelaySettings) -> RelaySettings {
        let mut merged = self.clone();
        for (url, policy) in other.iter() {
            merged
                .0
                .entry(url.clone())
                .and_modify(|p| {
                    p.read |= policy.read;
                    p.write |= policy.write;
                })
                .or_insert(*policy);
        }
        merged
    }

    /// Build settings from NIP-65 `r` tags.
    ///
    /// `["r", url]` is read+write, a third element of `read`/`write`
    /// restricts it. Unparseable URLs are skipped.
    pub fn from_relay_list_tags(tags: &[Vec<String>]) -> Self {
        let mut settings = Self::new();
        for tag in tags {
            if tag.first().map(String::as_str) != Some("r") {
                continue;
            }
            let Some(url) = tag.get(1).and_then(|u| RelayUrl::parse(u).ok()) else {
                continue;
            };
            let policy = match tag.get(2).map(String::as_str) {
                Some("read") => RelayPolicy::new(true, false),
                Some("write") => RelayPolicy::new(false, true),
                _ => RelayPolicy::READ_WRITE,
            };
            settings.0.insert(url, policy);
        }
        settings
    }

    /// Inverse of [`RelaySettings::from_relay_list_tags`]. Entries with
    /// neither permission are dropped.
    pub fn to_relay_list_tags(&self) -> Vec<Vec<String>> {
        self.0
            .iter()
            .filter_map(|(url, policy)| {
                let mut tag = vec!["r".to_string(), url.to_string()];
                match (policy.read, policy.write) {
                    (true, true) => {}
                    (true, false) => tag.push("read".to_string()),
                    (false, true) => tag.push("write".to_string()),
                    (false, false) => return None,
                }
                Some(tag)
            })
            .collect()
    }

    /// Parse the legacy relay-info blob carried in contact-list content:
    /// `{"wss://relay": {"read": true, "write": true}, ...}`.
    pub fn from_contact_content(content: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, RelayPolicy> = serde_json::from_str(content)?;
        Ok(Self(
            raw.into_iter()
                .filter_map(|(url, policy)| RelayUrl::parse(&url).ok().map(|u| (u, policy)))
                .collect(),
        ))
    }
}

impl FromIterator<(RelayUrl, RelayPolicy)> for RelaySettings {
    fn from_iter<T: IntoIterator<Item = (RelayUrl, RelayPolicy)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> RelayUrl {
        RelayUrl::parse(s).unwrap()
    }

    #[test]
    fn test_relay_url_normalization() {
        assert_eq!(url("WSS://Relay.Example.COM/").as_str(), "wss://relay.example.com");
        assert_eq!(url("wss://relay.example.com/Path").as_str(), "wss://relay.example.com/Path");
        assert!(RelayUrl::parse("https://relay.example.com").is_err());
        assert!(RelayUrl::parse("wss://").is_err());
    }

    #[test]
    fn test_relay_list_tags_roundtrip_policies() {
        let tags = vec![
            vec!["r".to_string(), "wss://a.example".to_string()],
            vec!["r".to_string(), "wss://b.example".to_string(), "read".to_string()],
            vec!["r".to_string(), "wss://c.example".to_string(), "write".to_string()],
            vec!["p".to_string(), "ignored".to_string()],
            vec!["r".to_string(), "not a url".to_string()],
        ];
        let settings = RelaySettings::from_relay_list_tags(&tags);
        assert_eq!(settings.len(), 3);
        assert_eq!(settings.get(&url("wss://a.example")), Some(RelayPolicy::READ_WRITE));
        assert_eq!(settings.get(&url("wss://b.example")), Some(RelayPolicy::new(true, false)));
        assert_eq!(settings.get(&url("wss://c.example")), Some(RelayPolicy::new(false, true)));

        let back = settings.to_relay_list_tags();
        assert_eq!(back, tags[..3].to_vec());
    }

    #[test]
    fn test_merged_ors_permissions() {
        let mut a = RelaySettings::new();
        a.insert(url("wss://a.example"), RelayPolicy::new(true, false));
        let mut b = RelaySettings::new();
        b.insert(url("wss://a.example"), RelayPolicy::new(false, true));
        b.insert(url("wss://b.example"), RelayPolicy::READ_WRITE);

        let merged = a.merged(&b);
        assert_eq!(merged.get(&url("wss://a.example")), Some(RelayPolicy::READ_WRITE));
        assert!(merged.contains(&url("wss://b.example")));
    }

    #[test]
    fn test_contact_content_parsing() {
        let content = r#"{
            "wss://a.example/": {"read": true, "write": false},
            "bogus": {"read": true, "write": true}
        }"#;
        let settings = RelaySettings::from_contact_content(content).unwrap();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings.get(&url("wss://a.example")), Some(RelayPolicy::new(true, false)));

        assert!(RelaySettings::from_contact_content("not json").is_err());
    }

    #[test]
    fn test_settings_serialize_as_map() {
        let settings = RelaySettings::from_urls([url("wss://a.example")]);
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"wss://a.example":{"read":true,"write":true}}"#);
        let back: RelaySettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
