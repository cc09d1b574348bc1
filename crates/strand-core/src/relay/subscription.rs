//! Subscription multiplexing over the shared relay pool.
//!
//! Many logical queries share the same relay sockets; the subscription id
//! is the only isolation between them. The router owns one route per live
//! subscription and dispatches incoming relay messages by exact id match.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use nostr::{Event, EventId, Filter};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::message::IncomingMessage;
use super::RelayUrl;

/// Message delivered to a subscription handler.
#[derive(Debug, Clone)]
pub enum SubscriptionMessage {
    Event { relay: RelayUrl, event: Box<Event> },
    /// Every relay the subscription was sent to is done with stored events.
    /// Live events may still follow.
    Eose,
    /// One relay refused or ended the subscription.
    Closed { relay: RelayUrl, message: String },
}

type CloseHook = Box<dyn FnOnce(&str) + Send>;

struct Route {
    tx: mpsc::UnboundedSender<SubscriptionMessage>,
    filter: Filter,
    awaiting_eose: HashSet<RelayUrl>,
    eose_delivered: bool,
    seen: HashSet<EventId>,
}

impl Route {
    fn mark_relay_done(&mut self, relay: &RelayUrl) {
        if self.awaiting_eose.remove(relay) {
            self.deliver_eose_if_settled();
        }
    }

    fn deliver_eose_if_settled(&mut self) {
        if !self.eose_delivered && self.awaiting_eose.is_empty() {
            self.eose_delivered = true;
            let _ = self.tx.send(SubscriptionMessage::Eose);
        }
    }
}

pub struct SubscriptionRouter {
    instance: String,
    counter: AtomicU64,
    routes: Mutex<HashMap<String, Route>>,
}

impl SubscriptionRouter {
    pub fn new() -> Arc<Self> {
        let instance = uuid::Uuid::new_v4().simple().to_string();
        Arc::new(Self {
            instance: instance[..8].to_string(),
            counter: AtomicU64::new(0),
            routes: Mutex::new(HashMap::new()),
        })
    }

    /// Allocate a subscription id unique to this process and router instance.
    pub fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}:{}:{}", prefix, self.instance, n)
    }

    /// Register a route for `id`. Messages for it are delivered to the
    /// returned [`Subscription`] until it is unsubscribed or dropped.
    ///
    /// `relays` is the set of relays the REQ was sent to; an aggregated
    /// `Eose` is delivered once all of them have finished. With no relays it
    /// is delivered immediately.
    pub fn subscribe_to(
        self: &Arc<Self>,
        id: String,
        filter: Filter,
        relays: HashSet<RelayUrl>,
        on_close: Option<CloseHook>,
    ) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut route = Route {
            tx,
            filter,
            awaiting_eose: relays,
            eose_delivered: false,
            seen: HashSet::new(),
        };
        route.deliver_eose_if_settled();
        self.routes.lock().insert(id.clone(), route);

        Subscription {
            id,
            rx,
            router: Arc::downgrade(self),
            on_close,
        }
    }

    /// Route a relay message to its subscription.
    ///
    /// Returns `false` if nothing is registered under the message's id
    /// (including messages that carry no id at all).
    pub fn dispatch(&self, relay: &RelayUrl, message: IncomingMessage) -> bool {
        let Some(id) = message.subscription_id().map(str::to_string) else {
            return false;
        };

        let mut routes = self.routes.lock();
        let Some(route) = routes.get_mut(&id) else {
            tracing::trace!(%relay, subscription = %id, "message for unknown subscription");
            return false;
        };

        match message {
            IncomingMessage::Event { event, .. } => {
                if route.seen.insert(event.id) {
                    let _ = route.tx.send(SubscriptionMessage::Event {
                        relay: relay.clone(),
                        event,
                    });
                }
            }
            IncomingMessage::Eose { .. } => route.mark_relay_done(relay),
            IncomingMessage::Closed { message, .. } => {
                let _ = route.tx.send(SubscriptionMessage::Closed {
                    relay: relay.clone(),
                    message,
                });
                route.mark_relay_done(relay);
            }
            _ => {}
        }
        true
    }

    /// A relay disconnected: stop waiting for its EOSE.
    pub fn relay_gone(&self, relay: &RelayUrl) {
        for route in self.routes.lock().values_mut() {
            route.mark_relay_done(relay);
        }
    }

    /// A relay (re)connected: returns the live subscriptions to re-send to it.
    /// Subscriptions still waiting for stored events also wait for this relay.
    pub fn relay_joined(&self, relay: &RelayUrl) -> Vec<(String, Filter)> {
        self.routes
            .lock()
            .iter_mut()
            .map(|(id, route)| {
                if !route.eose_delivered {
                    route.awaiting_eose.insert(relay.clone());
                }
                (id.clone(), route.filter.clone())
            })
            .collect()
    }

    pub fn remove(&self, id: &str) -> bool {
        self.routes.lock().remove(id).is_some()
    }

    /// Drop every route. Subscriptions observe end-of-stream.
    pub fn close_all(&self) {
        self.routes.lock().clear();
    }

    pub fn active_count(&self) -> usize {
        self.routes.lock().len()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.routes.lock().contains_key(id)
    }
}

/// Handle to one live subscription.
///
/// Releasing it (explicitly via [`Subscription::unsubscribe`] or by drop)
/// removes the route and runs the close hook, which tells relays to stop.
pub struct Subscription {
    id: String,
    rx: mpsc::UnboundedReceiver<SubscriptionMessage>,
    router: Weak<SubscriptionRouter>,
    on_close: Option<CloseHook>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next message, or `None` once the subscription has been torn down.
    pub async fn recv(&mut self) -> Option<SubscriptionMessage> {
        self.rx.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(router) = self.router.upgrade() {
            router.remove(&self.id);
        }
        if let Some(hook) = self.on_close.take() {
            hook(&self.id);
        }
    }

    /// Collect deduplicated events until EOSE, then unsubscribe.
    ///
    /// If EOSE does not arrive within `timeout` the subscription is forcibly
    /// closed and whatever arrived so far is returned with `timed_out` set.
    pub async fn collect_until_eose(mut self, timeout: Duration) -> FetchResult {
        let mut events = Vec::new();
        let mut ids = HashSet::new();
        let mut timed_out = false;
        let id = self.id.clone();

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(SubscriptionMessage::Event { event, .. }) => {
                        if ids.insert(event.id) {
                            events.push(*event);
                        }
                    }
                    Some(SubscriptionMessage::Closed { relay, message }) => {
                        tracing::debug!(
                            %relay,
                            subscription = %id,
                            "subscription closed by relay: {}",
                            message
                        );
                    }
                    Some(SubscriptionMessage::Eose) | None => break,
                },
                _ = &mut deadline => {
                    tracing::warn!(
                        subscription = %id,
                        "no EOSE after {:?}, closing subscription",
                        timeout
                    );
                    timed_out = true;
                    break;
                }
            }
        }

        self.unsubscribe();
        FetchResult { events, timed_out }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Events gathered by a REQ→EOSE round-trip.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    pub events: Vec<Event>,
    pub timed_out: bool,
}
