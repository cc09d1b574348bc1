//! In-memory relays for tests.
//!
//! A [`MockNetwork`] is a [`Connector`] that hands out channel pairs to
//! scripted [`MockRelay`]s. Each relay stores events, answers REQs with
//! matching stored events followed by EOSE, accepts or rejects published
//! events with `OK`, and can refuse or drop connections on demand.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use nostr::Event;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::transport::{Connector, RelayChannel, TransportError};
use super::RelayUrl;

#[derive(Default)]
pub(crate) struct MockNetwork {
    relays: Mutex<HashMap<RelayUrl, Arc<MockRelay>>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get or create the relay listening at `url`.
    pub fn relay(&self, url: &str) -> Arc<MockRelay> {
        let url = RelayUrl::parse(url).expect("valid mock relay url");
        self.relays
            .lock()
            .entry(url.clone())
            .or_insert_with(|| Arc::new(MockRelay::new(url)))
            .clone()
    }
}

impl Connector for MockNetwork {
    fn connect<'a>(
        &'a self,
        url: &'a RelayUrl,
    ) -> BoxFuture<'a, Result<RelayChannel, TransportError>> {
        Box::pin(async move {
            let relay = self.relays.lock().get(url).cloned();
            match relay {
                Some(relay) => relay.accept(),
                None => Err(TransportError::ConnectFailed {
                    url: url.to_string(),
                    reason: "unknown host".to_string(),
                }),
            }
        })
    }
}

struct MockRelayState {
    refuse: bool,
    accept: bool,
    reply_ok: bool,
    send_eose: bool,
    duplicate: bool,
    connects: usize,
    events: Vec<Event>,
    published: Vec<Event>,
    reqs: Vec<String>,
    closes: Vec<String>,
    connections: Vec<JoinHandle<()>>,
}

pub(crate) struct MockRelay {
    url: RelayUrl,
    state: Mutex<MockRelayState>,
}

impl MockRelay {
    fn new(url: RelayUrl) -> Self {
        Self {
            url,
            state: Mutex::new(MockRelayState {
                refuse: false,
                accept: true,
                reply_ok: true,
                send_eose: true,
                duplicate: false,
                connects: 0,
                events: Vec::new(),
                published: Vec::new(),
                reqs: Vec::new(),
                closes: Vec::new(),
                connections: Vec::new(),
            }),
        }
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    /// Whether published events get `OK true`.
    pub fn set_accept(&self, accept: bool) {
        self.state.lock().accept = accept;
    }

    /// Whether published events get any `OK` at all.
    pub fn set_reply_ok(&self, reply_ok: bool) {
        self.state.lock().reply_ok = reply_ok;
    }

    pub fn set_send_eose(&self, send_eose: bool) {
        self.state.lock().send_eose = send_eose;
    }

    /// Send every matching stored event twice.
    pub fn set_duplicate(&self, duplicate: bool) {
        self.state.lock().duplicate = duplicate;
    }

    pub fn store(&self, event: Event) {
        self.state.lock().events.push(event);
    }

    /// Connection attempts seen, including refused ones.
    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// Events accepted from clients.
    pub fn published(&self) -> Vec<Event> {
        self.state.lock().published.clone()
    }

    pub fn reqs(&self) -> Vec<String> {
        self.state.lock().reqs.clone()
    }

    pub fn closes(&self) -> Vec<String> {
        self.state.lock().closes.clone()
    }

    /// Kill every open connection as if the socket died.
    pub fn drop_connections(&self) {
        for task in self.state.lock().connections.drain(..) {
            task.abort();
        }
    }

    fn accept(self: Arc<Self>) -> Result<RelayChannel, TransportError> {
        let mut state = self.state.lock();
        state.connects += 1;
        if state.refuse {
            return Err(TransportError::ConnectFailed {
                url: self.url.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let (client_tx, mut relay_rx) = mpsc::unbounded_channel::<String>();
        let (relay_tx, client_rx) = mpsc::unbounded_channel::<String>();

        let relay = Arc::clone(&self);
        let task = tokio::spawn(async move {
            while let Some(frame) = relay_rx.recv().await {
                for reply in relay.handle(&frame) {
                    if relay_tx.send(reply).is_err() {
                        return;
                    }
                }
            }
        });
        state.connections.retain(|t| !t.is_finished());
        state.connections.push(task);

        Ok(RelayChannel {
            outgoing: client_tx,
            incoming: client_rx,
        })
    }

    fn handle(&self, frame: &str) -> Vec<String> {
        let Ok(Value::Array(items)) = serde_json::from_str::<Value>(frame) else {
            return vec![json!(["NOTICE", "invalid frame"]).to_string()];
        };
        let mut state = self.state.lock();

        match items.first().and_then(Value::as_str) {
            Some("REQ") => {
                let id = items.get(1).and_then(Value::as_str).unwrap_or_default().to_string();
                let filter = items.get(2).cloned().unwrap_or(Value::Null);
                state.reqs.push(id.clone());

                let mut matching: Vec<&Event> = state
                    .events
                    .iter()
                    .filter(|e| filter_matches(&filter, e))
                    .collect();
                matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                if let Some(limit) = filter.get("limit").and_then(Value::as_u64) {
                    matching.truncate(limit as usize);
                }

                let copies = if state.duplicate { 2 } else { 1 };
                let mut replies = Vec::new();
                for event in matching {
                    for _ in 0..copies {
                        replies.push(json!(["EVENT", id, event]).to_string());
                    }
                }
                if state.send_eose {
                    replies.push(json!(["EOSE", id]).to_string());
                }
                replies
            }
            Some("EVENT") => {
                let Some(event) = items
                    .get(1)
                    .cloned()
                    .and_then(|v| serde_json::from_value::<Event>(v).ok())
                else {
                    return vec![json!(["NOTICE", "invalid event"]).to_string()];
                };
                let id = event.id.to_hex();
                let accept = state.accept;
                if accept {
                    state.published.push(event.clone());
                    state.events.push(event);
                }
                if !state.reply_ok {
                    return Vec::new();
                }
                let message = if accept { "" } else { "blocked: not today" };
                vec![json!(["OK", id, accept, message]).to_string()]
            }
            Some("CLOSE") => {
                let id = items.get(1).and_then(Value::as_str).unwrap_or_default();
                state.closes.push(id.to_string());
                Vec::new()
            }
            _ => vec![json!(["NOTICE", "unsupported"]).to_string()],
        }
    }
}

/// Subset of NIP-01 filter matching: ids, authors, kinds and `#d`/`#e`/`#p`.
fn filter_matches(filter: &Value, event: &Event) -> bool {
    let in_list = |key: &str, value: &str| match filter.get(key).and_then(Value::as_array) {
        Some(list) => list.iter().any(|v| v.as_str() == Some(value)),
        None => true,
    };

    if !in_list("ids", &event.id.to_hex()) || !in_list("authors", &event.pubkey.to_hex()) {
        return false;
    }
    if let Some(kinds) = filter.get("kinds").and_then(Value::as_array) {
        let kind = u64::from(event.kind.as_u16());
        if !kinds.iter().any(|k| k.as_u64() == Some(kind)) {
            return false;
        }
    }
    for letter in ["d", "e", "p"] {
        let Some(wanted) = filter.get(format!("#{}", letter)).and_then(Value::as_array) else {
            continue;
        };
        let found = event.tags.iter().any(|tag| {
            let parts = tag.as_slice();
            parts.first().map(String::as_str) == Some(letter)
                && parts
                    .get(1)
                    .is_some_and(|v| wanted.iter().any(|w| w.as_str() == Some(v.as_str())))
        });
        if !found {
            return false;
        }
    }
    true
}
