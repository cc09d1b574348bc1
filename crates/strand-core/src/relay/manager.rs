//! Relay connection pool.
//!
//! [`RelayManager`] owns every socket the session holds. It knows nothing
//! about event semantics: it connects, retries with linear backoff, routes
//! incoming frames to the [`SubscriptionRouter`] and collects `OK` replies
//! for publishes. Failures are absorbed and reported on the status channel;
//! the open set may be empty or partial at any time.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use nostr::{Event, EventId, Filter};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::defaults::DefaultRelaySource;
use super::message::{IncomingMessage, OutgoingMessage};
use super::subscription::{FetchResult, Subscription, SubscriptionRouter};
use super::transport::{Connector, RelayChannel, TransportError};
use super::{RelayError, RelayPolicy, RelaySettings, RelayUrl};
use crate::constants::{PUBLISH_TIMEOUT, RELAY_BASE_TIMEOUT, RELAY_MAX_ATTEMPTS};
use crate::stats::SharedRelayStats;

#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Connect timeout, backoff unit, and a third of the stability window.
    pub base_timeout: Duration,
    /// Consecutive failures after which a relay is dropped.
    pub max_attempts: u32,
    pub publish_timeout: Duration,
    /// Always connected (read+write) on top of the account's settings.
    pub priority_relays: Vec<RelayUrl>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            base_timeout: RELAY_BASE_TIMEOUT,
            max_attempts: RELAY_MAX_ATTEMPTS,
            publish_timeout: PUBLISH_TIMEOUT,
            priority_relays: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Snapshot of one relay in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relay {
    pub url: RelayUrl,
    pub state: ConnectionState,
    pub read: bool,
    pub write: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayStatusEvent {
    Connected {
        url: RelayUrl,
    },
    Failed {
        url: RelayUrl,
        reason: String,
        attempt: u32,
    },
    /// Retry limit reached; the relay was removed from the pool.
    GaveUp {
        url: RelayUrl,
        attempts: u32,
    },
    Disconnected {
        url: RelayUrl,
    },
}

/// Result of the first connection attempt for one URL.
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    Connected(RelayUrl),
    /// Already connecting, open or waiting for a retry.
    AlreadyActive(RelayUrl),
    /// Explicitly closed, or the manager is shutting down.
    Skipped(RelayUrl),
    Failed {
        url: RelayUrl,
        error: TransportError,
    },
}

impl ConnectOutcome {
    pub fn url(&self) -> &RelayUrl {
        match self {
            Self::Connected(url) | Self::AlreadyActive(url) | Self::Skipped(url) => url,
            Self::Failed { url, .. } => url,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

/// Replies collected for a published event.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub event_id: EventId,
    pub accepted: Vec<RelayUrl>,
    pub rejected: Vec<(RelayUrl, String)>,
}

struct RelayEntry {
    policy: RelayPolicy,
    state: ConnectionState,
    generation: u64,
    outgoing: Option<mpsc::UnboundedSender<String>>,
    tasks: Vec<JoinHandle<()>>,
}

impl RelayEntry {
    fn connecting(policy: RelayPolicy, generation: u64) -> Self {
        Self {
            policy,
            state: ConnectionState::Connecting,
            generation,
            outgoing: None,
            tasks: Vec::new(),
        }
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(handle);
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[derive(Default)]
struct PoolState {
    relays: HashMap<RelayUrl, RelayEntry>,
    attempts: HashMap<RelayUrl, u32>,
    explicitly_closed: HashSet<RelayUrl>,
    /// Relays that exhausted their attempts. Like `explicitly_closed`, only
    /// an explicit add clears them.
    gave_up: HashSet<RelayUrl>,
    next_generation: u64,
    shut_down: bool,
}

impl PoolState {
    fn is_blocked(&self, url: &RelayUrl) -> bool {
        self.explicitly_closed.contains(url) || self.gave_up.contains(url)
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn open_senders(
        &self,
        want: impl Fn(&RelayPolicy) -> bool,
    ) -> Vec<(RelayUrl, mpsc::UnboundedSender<String>)> {
        self.relays
            .iter()
            .filter(|(_, e)| e.state == ConnectionState::Open && want(&e.policy))
            .filter_map(|(url, e)| e.outgoing.clone().map(|tx| (url.clone(), tx)))
            .collect()
    }
}

type OkReply = (RelayUrl, bool, String);

struct ManagerInner {
    connector: Arc<dyn Connector>,
    defaults: Arc<dyn DefaultRelaySource>,
    opts: RelayOptions,
    state: Mutex<PoolState>,
    router: Arc<SubscriptionRouter>,
    status_tx: broadcast::Sender<RelayStatusEvent>,
    ok_waiters: Mutex<HashMap<String, mpsc::UnboundedSender<OkReply>>>,
    stats: SharedRelayStats,
}

/// Handle to the relay pool. Cheap to clone.
#[derive(Clone)]
pub struct RelayManager {
    inner: Arc<ManagerInner>,
}

impl RelayManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        defaults: Arc<dyn DefaultRelaySource>,
        opts: RelayOptions,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(ManagerInner {
                connector,
                defaults,
                opts,
                state: Mutex::new(PoolState::default()),
                router: SubscriptionRouter::new(),
                status_tx,
                ok_waiters: Mutex::new(HashMap::new()),
                stats: SharedRelayStats::new(),
            }),
        }
    }

    pub fn status_events(&self) -> broadcast::Receiver<RelayStatusEvent> {
        self.inner.status_tx.subscribe()
    }

    pub fn stats(&self) -> SharedRelayStats {
        self.inner.stats.clone()
    }

    pub fn router(&self) -> &Arc<SubscriptionRouter> {
        &self.inner.router
    }

    /// Connect to every URL in `settings` that is not already active.
    /// Returns the outcome of each URL's first attempt; retries continue in
    /// the background.
    pub async fn connect(&self, settings: &RelaySettings) -> Vec<ConnectOutcome> {
        let attempts = settings
            .iter()
            .map(|(url, policy)| self.inner.connect_one(url.clone(), *policy));
        join_all(attempts).await
    }

    /// Connect the account's relays plus the priority relays. Empty
    /// settings are replaced by the platform default list.
    pub async fn connect_to_relays(&self, settings: &RelaySettings) -> Vec<ConnectOutcome> {
        let effective = self.effective_settings(settings).await;
        tracing::info!("Connecting to {} relays", effective.len());
        self.connect(&effective).await
    }

    async fn effective_settings(&self, settings: &RelaySettings) -> RelaySettings {
        let base = if settings.is_empty() {
            let defaults = self.inner.defaults.default_relays().await;
            tracing::info!("No relay settings, using {} default relays", defaults.len());
            RelaySettings::from_urls(defaults)
        } else {
            settings.clone()
        };
        base.merged(&self.priority_settings())
    }

    fn priority_settings(&self) -> RelaySettings {
        RelaySettings::from_urls(self.inner.opts.priority_relays.iter().cloned())
    }

    /// Explicit add: forget any earlier close, give-up and failure count,
    /// then connect.
    pub async fn add_relay(&self, url: RelayUrl, policy: RelayPolicy) -> ConnectOutcome {
        {
            let mut state = self.inner.state.lock();
            state.explicitly_closed.remove(&url);
            state.gave_up.remove(&url);
            state.attempts.remove(&url);
        }
        if self.inner.update_policy(&url, policy) {
            return ConnectOutcome::AlreadyActive(url);
        }
        self.inner.connect_one(url, policy).await
    }

    /// Close the socket and stop retrying. Returns `false` if the relay was
    /// not in the pool (it is still marked closed).
    pub fn disconnect(&self, url: &RelayUrl) -> bool {
        self.inner.disconnect(url)
    }

    /// Reconcile the pool with `settings`: removed URLs are disconnected,
    /// kept URLs get the new permissions and new URLs are connected.
    /// Priority relays are never removed. Closed or given-up relays stay
    /// that way until [`Self::add_relay`].
    pub async fn sync_settings(&self, settings: &RelaySettings) -> Vec<ConnectOutcome> {
        let effective = settings.merged(&self.priority_settings());

        let removed: Vec<RelayUrl> = {
            let state = self.inner.state.lock();
            state
                .relays
                .keys()
                .filter(|url| !effective.contains(url))
                .cloned()
                .collect()
        };
        for url in &removed {
            self.inner.disconnect(url);
        }

        let mut added = RelaySettings::new();
        for (url, policy) in effective.iter() {
            if !self.inner.update_policy(url, *policy) {
                added.insert(url.clone(), *policy);
            }
        }
        tracing::debug!(
            removed = removed.len(),
            added = added.len(),
            "relay settings synced"
        );
        self.connect(&added).await
    }

    /// Disconnect everything, cancel subscriptions and stop all retries.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub fn relays(&self) -> Vec<Relay> {
        let state = self.inner.state.lock();
        let mut relays: Vec<Relay> = state
            .relays
            .iter()
            .map(|(url, e)| Relay {
                url: url.clone(),
                state: e.state,
                read: e.policy.read,
                write: e.policy.write,
            })
            .collect();
        relays.sort_by(|a, b| a.url.cmp(&b.url));
        relays
    }

    pub fn is_connected(&self, url: &RelayUrl) -> bool {
        self.inner
            .state
            .lock()
            .relays
            .get(url)
            .is_some_and(|e| e.state == ConnectionState::Open)
    }

    /// Current consecutive-failure count for `url`.
    pub fn attempts(&self, url: &RelayUrl) -> u32 {
        self.inner
            .state
            .lock()
            .attempts
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Send `event` to every open write relay and wait for their `OK`s.
    pub async fn publish(&self, event: &Event) -> Result<PublishOutcome, RelayError> {
        self.inner.publish(event).await
    }

    /// Open a live subscription on every open read relay. Relays that
    /// connect later receive it too.
    pub fn subscribe(&self, prefix: &str, filter: Filter) -> Result<Subscription, RelayError> {
        self.inner.subscribe(prefix, filter)
    }

    /// One REQ→EOSE round-trip.
    pub async fn fetch(
        &self,
        filter: Filter,
        timeout: Duration,
    ) -> Result<FetchResult, RelayError> {
        let subscription = self.inner.subscribe("fetch", filter)?;
        Ok(subscription.collect_until_eose(timeout).await)
    }
}

impl ManagerInner {
    fn emit(&self, event: RelayStatusEvent) {
        let _ = self.status_tx.send(event);
    }

    /// Update the permissions of an active relay. Returns `false` if the
    /// relay is not in the pool.
    fn update_policy(self: &Arc<Self>, url: &RelayUrl, policy: RelayPolicy) -> bool {
        let resend = {
            let mut state = self.state.lock();
            let Some(entry) = state.relays.get_mut(url) else {
                return false;
            };
            let gained_read = policy.read && !entry.policy.read;
            entry.policy = policy;
            match (&entry.outgoing, entry.state) {
                (Some(tx), ConnectionState::Open) if gained_read => Some(tx.clone()),
                _ => None,
            }
        };
        if let Some(tx) = resend {
            self.resend_subscriptions(url, &tx);
        }
        true
    }

    async fn connect_one(self: &Arc<Self>, url: RelayUrl, policy: RelayPolicy) -> ConnectOutcome {
        let generation = {
            let mut state = self.state.lock();
            if state.shut_down || state.is_blocked(&url) {
                tracing::debug!(%url, "skipping closed relay");
                return ConnectOutcome::Skipped(url);
            }
            if let Some(entry) = state.relays.get_mut(&url) {
                entry.policy = policy;
                return ConnectOutcome::AlreadyActive(url);
            }
            let generation = state.bump_generation();
            state
                .relays
                .insert(url.clone(), RelayEntry::connecting(policy, generation));
            generation
        };

        match self.attempt(&url, generation).await {
            Ok(()) => ConnectOutcome::Connected(url),
            Err(error) => ConnectOutcome::Failed { url, error },
        }
    }

    async fn attempt(
        self: &Arc<Self>,
        url: &RelayUrl,
        generation: u64,
    ) -> Result<(), TransportError> {
        self.stats.record_attempt(url.as_str());
        tracing::debug!(%url, generation, "connecting to relay");

        let connect = self.connector.connect(url);
        let result = match tokio::time::timeout(self.opts.base_timeout, connect).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(url.to_string())),
        };

        match result {
            Ok(channel) => self.on_open(url, generation, channel),
            Err(e) => {
                self.stats.record_failure(url.as_str());
                self.handle_failure(url, generation, e.to_string());
                Err(e)
            }
        }
    }

    fn on_open(
        self: &Arc<Self>,
        url: &RelayUrl,
        generation: u64,
        channel: RelayChannel,
    ) -> Result<(), TransportError> {
        let RelayChannel { outgoing, incoming } = channel;

        let read = {
            let mut state = self.state.lock();
            let current = !state.shut_down && !state.explicitly_closed.contains(url);
            let entry = match state.relays.get_mut(url) {
                Some(entry) if current && entry.generation == generation => entry,
                // Removed or re-added while connecting; dropping the channel
                // closes the socket.
                _ => {
                    return Err(TransportError::ConnectFailed {
                        url: url.to_string(),
                        reason: "connection superseded".to_string(),
                    })
                }
            };

            entry.state = ConnectionState::Open;
            entry.outgoing = Some(outgoing.clone());

            let reader =
                tokio::spawn(Arc::clone(self).read_loop(url.clone(), generation, incoming));
            entry.track(reader);

            let inner = Arc::clone(self);
            let stable_url = url.clone();
            let stability = tokio::spawn(async move {
                tokio::time::sleep(inner.opts.base_timeout * 3).await;
                inner.mark_stable(&stable_url, generation);
            });
            entry.track(stability);

            entry.policy.read
        };

        self.stats.record_success(url.as_str());
        tracing::info!(%url, "Connected to relay");
        if read {
            self.resend_subscriptions(url, &outgoing);
        }
        self.emit(RelayStatusEvent::Connected { url: url.clone() });
        Ok(())
    }

    fn resend_subscriptions(&self, url: &RelayUrl, outgoing: &mpsc::UnboundedSender<String>) {
        for (subscription_id, filter) in self.router.relay_joined(url) {
            tracing::debug!(%url, subscription = %subscription_id, "sending subscription");
            let frame = OutgoingMessage::Req {
                subscription_id,
                filter,
            }
            .to_json();
            if outgoing.send(frame).is_err() {
                break;
            }
        }
    }

    fn mark_stable(&self, url: &RelayUrl, generation: u64) {
        let mut state = self.state.lock();
        let stable = state
            .relays
            .get(url)
            .is_some_and(|e| e.generation == generation && e.state == ConnectionState::Open);
        if stable && state.attempts.remove(url).is_some() {
            tracing::debug!(%url, "connection stable, attempt counter reset");
        }
    }

    async fn read_loop(
        self: Arc<Self>,
        url: RelayUrl,
        generation: u64,
        mut incoming: mpsc::UnboundedReceiver<String>,
    ) {
        while let Some(text) = incoming.recv().await {
            self.handle_frame(&url, &text);
        }
        self.stats.record_failure(url.as_str());
        self.handle_failure(&url, generation, "connection closed".to_string());
    }

    fn handle_frame(&self, url: &RelayUrl, text: &str) {
        let message = match IncomingMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(%url, error = %e, "dropping relay frame");
                return;
            }
        };

        match message {
            IncomingMessage::Ok {
                event_id,
                accepted,
                message,
            } => {
                if let Some(tx) = self.ok_waiters.lock().get(&event_id) {
                    let _ = tx.send((url.clone(), accepted, message));
                }
            }
            IncomingMessage::Notice { message } => {
                tracing::info!(%url, "relay notice: {}", message);
            }
            IncomingMessage::Auth { .. } => {
                tracing::debug!(%url, "relay requested auth, ignoring");
            }
            message => {
                if let IncomingMessage::Event { event, .. } = &message {
                    self.stats.record_event(url.as_str(), event.kind.as_u16());
                }
                self.router.dispatch(url, message);
            }
        }
    }

    /// Failure path for a connection attempt or an open socket.
    fn handle_failure(self: &Arc<Self>, url: &RelayUrl, generation: u64, reason: String) {
        let (attempt, gave_up, was_open) = {
            let mut state = self.state.lock();
            if state.shut_down || state.explicitly_closed.contains(url) {
                return;
            }
            if state.relays.get(url).map(|e| e.generation) != Some(generation) {
                return;
            }

            let attempt = {
                let counter = state.attempts.entry(url.clone()).or_insert(0);
                *counter += 1;
                *counter
            };

            if attempt >= self.opts.max_attempts {
                let was_open = state
                    .relays
                    .remove(url)
                    .is_some_and(|e| e.state == ConnectionState::Open);
                state.attempts.remove(url);
                state.gave_up.insert(url.clone());
                (attempt, true, was_open)
            } else {
                let delay = self.opts.base_timeout * attempt;
                let inner = Arc::clone(self);
                let retry_url = url.clone();
                let retry = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.retry(retry_url, generation).await;
                });

                let mut was_open = false;
                if let Some(entry) = state.relays.get_mut(url) {
                    was_open = entry.state == ConnectionState::Open;
                    entry.state = ConnectionState::Closed;
                    entry.outgoing = None;
                    entry.track(retry);
                }
                (attempt, false, was_open)
            }
        };

        if was_open {
            self.router.relay_gone(url);
        }
        tracing::debug!(%url, attempt, "relay connection failed: {}", reason);
        self.emit(RelayStatusEvent::Failed {
            url: url.clone(),
            reason,
            attempt,
        });

        if gave_up {
            tracing::warn!(%url, "Giving up on relay after {} attempts", attempt);
            self.emit(RelayStatusEvent::GaveUp {
                url: url.clone(),
                attempts: attempt,
            });
        }
    }

    async fn retry(self: Arc<Self>, url: RelayUrl, failed_generation: u64) {
        let generation = {
            let mut state = self.state.lock();
            if state.shut_down || state.explicitly_closed.contains(&url) {
                return;
            }
            let generation = state.bump_generation();
            match state.relays.get_mut(&url) {
                Some(entry) if entry.generation == failed_generation => {
                    entry.generation = generation;
                    entry.state = ConnectionState::Connecting;
                    generation
                }
                _ => return,
            }
        };
        let _ = self.attempt(&url, generation).await;
    }

    fn disconnect(&self, url: &RelayUrl) -> bool {
        let entry = {
            let mut state = self.state.lock();
            state.explicitly_closed.insert(url.clone());
            state.attempts.remove(url);
            state.relays.remove(url)
        };

        let Some(mut entry) = entry else {
            return false;
        };
        entry.abort_tasks();
        drop(entry.outgoing.take());
        self.router.relay_gone(url);
        tracing::info!(%url, "Disconnected from relay");
        self.emit(RelayStatusEvent::Disconnected { url: url.clone() });
        true
    }

    fn teardown(&self) {
        let entries: Vec<(RelayUrl, RelayEntry)> = {
            let mut state = self.state.lock();
            state.shut_down = true;
            state.attempts.clear();
            state.relays.drain().collect()
        };

        for (url, mut entry) in entries {
            entry.abort_tasks();
            self.emit(RelayStatusEvent::Disconnected { url });
        }
        self.ok_waiters.lock().clear();
        self.router.close_all();
        tracing::info!("Relay pool torn down");
    }

    async fn publish(&self, event: &Event) -> Result<PublishOutcome, RelayError> {
        let targets = {
            let state = self.state.lock();
            if state.shut_down {
                return Err(RelayError::Shutdown);
            }
            state.open_senders(|p| p.write)
        };
        if targets.is_empty() {
            return Err(RelayError::NoRelays("publish"));
        }

        let event_id = event.id.to_hex();
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.ok_waiters.lock().insert(event_id.clone(), tx);
        let _waiter = OkWaiter {
            waiters: &self.ok_waiters,
            event_id: event_id.clone(),
        };

        let frame = OutgoingMessage::Event(Box::new(event.clone())).to_json();
        let mut pending: HashSet<RelayUrl> = targets
            .into_iter()
            .filter(|(_, tx)| tx.send(frame.clone()).is_ok())
            .map(|(url, _)| url)
            .collect();
        if pending.is_empty() {
            return Err(RelayError::NoRelays("publish"));
        }
        tracing::debug!(event = %event_id, relays = pending.len(), "published event");

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        let deadline = tokio::time::sleep(self.opts.publish_timeout);
        tokio::pin!(deadline);

        while !pending.is_empty() {
            tokio::select! {
                reply = rx.recv() => match reply {
                    Some((url, ok, message)) => {
                        if !pending.remove(&url) {
                            continue;
                        }
                        if ok {
                            accepted.push(url);
                        } else {
                            tracing::debug!(%url, event = %event_id, "event rejected: {}", message);
                            rejected.push((url, message));
                        }
                    }
                    None => break,
                },
                _ = &mut deadline => break,
            }
        }

        rejected.extend(pending.into_iter().map(|url| (url, "no reply".to_string())));

        if accepted.is_empty() {
            return Err(RelayError::Rejected {
                event_id,
                replies: rejected,
            });
        }
        Ok(PublishOutcome {
            event_id: event.id,
            accepted,
            rejected,
        })
    }

    fn subscribe(
        self: &Arc<Self>,
        prefix: &str,
        filter: Filter,
    ) -> Result<Subscription, RelayError> {
        let targets = {
            let state = self.state.lock();
            if state.shut_down {
                return Err(RelayError::Shutdown);
            }
            state.open_senders(|p| p.read)
        };

        let id = self.router.next_id(prefix);
        let relays: HashSet<RelayUrl> = targets.iter().map(|(url, _)| url.clone()).collect();
        let weak: Weak<ManagerInner> = Arc::downgrade(self);
        let on_close: Box<dyn FnOnce(&str) + Send> = Box::new(move |id: &str| {
            if let Some(inner) = weak.upgrade() {
                inner.send_close(id);
            }
        });
        let subscription = self
            .router
            .subscribe_to(id.clone(), filter.clone(), relays, Some(on_close));

        let frame = OutgoingMessage::Req {
            subscription_id: id.clone(),
            filter,
        }
        .to_json();
        for (url, tx) in targets {
            if tx.send(frame.clone()).is_err() {
                self.router.relay_gone(&url);
            }
        }
        tracing::debug!(subscription = %id, "subscription opened");
        Ok(subscription)
    }

    fn send_close(&self, subscription_id: &str) {
        let targets = self.state.lock().open_senders(|p| p.read);
        let frame = OutgoingMessage::Close {
            subscription_id: subscription_id.to_string(),
        }
        .to_json();
        for (_, tx) in targets {
            let _ = tx.send(frame.clone());
        }
    }
}

/// Removes the OK waiter for a publish on every exit path.
struct OkWaiter<'a> {
    waiters: &'a Mutex<HashMap<String, mpsc::UnboundedSender<OkReply>>>,
    event_id: String,
}

impl Drop for OkWaiter<'_> {
    fn drop(&mut self) {
        self.waiters.lock().remove(&self.event_id);
    }
}
