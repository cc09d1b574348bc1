//! Platform default relay list, used when an account has no relay settings.

use std::collections::BTreeMap;

use futures::future::BoxFuture;
use serde::Deserialize;

use super::RelayUrl;
use crate::constants::DEFAULT_RELAYS;

/// Source of the fallback relay list.
pub trait DefaultRelaySource: Send + Sync + 'static {
    fn default_relays(&self) -> BoxFuture<'_, Vec<RelayUrl>>;
}

/// Fixed list, handy for tests and offline setups.
#[derive(Debug, Clone, Default)]
pub struct StaticDefaultRelays(pub Vec<RelayUrl>);

impl StaticDefaultRelays {
    /// The built-in defaults.
    pub fn builtin() -> Self {
        Self(builtin_relays())
    }
}

impl DefaultRelaySource for StaticDefaultRelays {
    fn default_relays(&self) -> BoxFuture<'_, Vec<RelayUrl>> {
        let relays = self.0.clone();
        Box::pin(async move { relays })
    }
}

/// Fetches the default list from an HTTP endpoint, falling back to the
/// built-in list on any error.
///
/// The endpoint may answer with a JSON array of URLs or with an object keyed
/// by URL (the relay-info shape used in contact lists).
pub struct HttpDefaultRelays {
    url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefaultRelaysBody {
    List(Vec<String>),
    Map(BTreeMap<String, serde_json::Value>),
}

impl HttpDefaultRelays {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self) -> Result<Vec<RelayUrl>, reqwest::Error> {
        let body: DefaultRelaysBody = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(parse_body(body))
    }
}

impl DefaultRelaySource for HttpDefaultRelays {
    fn default_relays(&self) -> BoxFuture<'_, Vec<RelayUrl>> {
        Box::pin(async move {
            match self.fetch().await {
                Ok(relays) if !relays.is_empty() => {
                    tracing::debug!(
                        url = %self.url,
                        count = relays.len(),
                        "fetched default relays"
                    );
                    relays
                }
                Ok(_) => {
                    tracing::warn!(
                        url = %self.url,
                        "default relay endpoint returned no relays, using built-in list"
                    );
                    builtin_relays()
                }
                Err(e) => {
                    tracing::warn!(
                        url = %self.url,
                        error = %e,
                        "failed to fetch default relays, using built-in list"
                    );
                    builtin_relays()
                }
            }
        })
    }
}

fn parse_body(body: DefaultRelaysBody) -> Vec<RelayUrl> {
    let urls: Vec<String> = match body {
        DefaultRelaysBody::List(urls) => urls,
        DefaultRelaysBody::Map(map) => map.into_keys().collect(),
    };
    urls.iter()
        .filter_map(|u| RelayUrl::parse(u).ok())
        .collect()
}

pub(crate) fn builtin_relays() -> Vec<RelayUrl> {
    DEFAULT_RELAYS
        .iter()
        .filter_map(|u| RelayUrl::parse(u).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_and_map_bodies() {
        let list: DefaultRelaysBody =
            serde_json::from_str(r#"["wss://a.example/", "nope", "wss://b.example"]"#).unwrap();
        let urls = parse_body(list);
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].as_str(), "wss://a.example");

        let map: DefaultRelaysBody =
            serde_json::from_str(r#"{"wss://c.example":{"read":true,"write":true}}"#).unwrap();
        assert_eq!(parse_body(map)[0].as_str(), "wss://c.example");
    }

    #[test]
    fn test_builtin_relays_parse() {
        assert_eq!(builtin_relays().len(), DEFAULT_RELAYS.len());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        let source = HttpDefaultRelays::new("http://127.0.0.1:9/relays.json");
        assert_eq!(source.default_relays().await, builtin_relays());
    }
}
