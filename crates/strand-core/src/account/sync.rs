//! The account synchronization state machine.
//!
//! Every list follows the same protocol. Reads apply an incoming version
//! only when it is at least as new as the held one. Writes re-fetch the
//! freshest version, edit it, sign it with a strictly newer `created_at`
//! and publish it; local state changes only after a relay accepted it.

use std::sync::Arc;
use std::time::Duration;

use nostr::{EventBuilder, EventId, Filter, Kind, PublicKey, Tag, Timestamp};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::lists::{self, is_fresh, ListKind, TagList};
use super::signer::EventSigner;
use super::state::{AccountState, InFlight, LoadingGuard, PendingKey, Phase};
use super::{AccountEvent, MutationOutcome, SyncError};
use crate::constants::{kinds, LIKES_FETCH_LIMIT};
use crate::relay::{RelayManager, RelayPolicy, RelaySettings, RelayUrl};
use crate::storage::{AccountSnapshot, AccountStorage};

/// A requested edit to one list.
#[derive(Debug, Clone)]
enum Change {
    Add(String),
    Remove(String),
    SetRelay(RelayUrl, RelayPolicy),
    RemoveRelay(RelayUrl),
}

impl Change {
    fn target(&self) -> String {
        match self {
            Self::Add(pk) | Self::Remove(pk) => pk.clone(),
            Self::SetRelay(url, _) | Self::RemoveRelay(url) => url.to_string(),
        }
    }

    fn removes(&self) -> bool {
        matches!(self, Self::Remove(_) | Self::RemoveRelay(_))
    }

    fn is_satisfied_by(&self, list: &TagList) -> bool {
        match self {
            Self::Add(pk) => list.contains("p", pk),
            Self::Remove(pk) => !list.contains("p", pk),
            Self::SetRelay(url, policy) => {
                RelaySettings::from_relay_list_tags(&list.tags).get(url) == Some(*policy)
            }
            Self::RemoveRelay(url) => {
                !RelaySettings::from_relay_list_tags(&list.tags).contains(url)
            }
        }
    }

    fn apply(&self, list: &TagList) -> TagList {
        match self {
            Self::Add(pk) => list.with_tag(vec!["p".to_string(), pk.clone()]),
            Self::Remove(pk) => list.without("p", pk),
            Self::SetRelay(url, policy) => {
                let mut next = without_relay(list, url);
                let entry: RelaySettings = [(url.clone(), *policy)].into_iter().collect();
                next.tags.extend(entry.to_relay_list_tags());
                next
            }
            Self::RemoveRelay(url) => without_relay(list, url),
        }
    }
}

/// Drop every `r` tag that normalizes to `url`.
fn without_relay(list: &TagList, url: &RelayUrl) -> TagList {
    let mut next = list.clone();
    next.tags.retain(|tag| {
        let is_r = tag.first().map(String::as_str) == Some("r");
        !(is_r && tag.get(1).and_then(|u| RelayUrl::parse(u).ok()).as_ref() == Some(url))
    });
    next
}

struct SyncInner {
    pubkey: PublicKey,
    signer: Arc<dyn EventSigner>,
    relays: RelayManager,
    storage: AccountStorage,
    state: Arc<Mutex<AccountState>>,
    events_tx: broadcast::Sender<AccountEvent>,
    fetch_timeout: Duration,
    /// One per [`ListKind`], held from the fetch of the base version until
    /// the edited version is applied.
    edit_locks: [tokio::sync::Mutex<()>; ListKind::ALL.len()],
}

/// Synchronizes one signed-in account. Cheap to clone.
#[derive(Clone)]
pub struct AccountSync {
    inner: Arc<SyncInner>,
}

impl AccountSync {
    pub fn new(
        signer: Arc<dyn EventSigner>,
        relays: RelayManager,
        storage: AccountStorage,
        fetch_timeout: Duration,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(SyncInner {
                pubkey: signer.public_key(),
                signer,
                relays,
                storage,
                state: Arc::new(Mutex::new(AccountState::default())),
                events_tx,
                fetch_timeout,
                edit_locks: std::array::from_fn(|_| tokio::sync::Mutex::new(())),
            }),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.inner.pubkey
    }

    pub fn relays(&self) -> &RelayManager {
        &self.inner.relays
    }

    pub fn events(&self) -> broadcast::Receiver<AccountEvent> {
        self.inner.events_tx.subscribe()
    }

    fn emit(&self, event: AccountEvent) {
        let _ = self.inner.events_tx.send(event);
    }

    /// Apply the local snapshot, connect relays and refresh every list.
    pub async fn load(&self) -> Result<(), SyncError> {
        let snapshot = self.inner.storage.get_storage(&self.inner.pubkey);
        self.apply_snapshot(&snapshot);

        let settings = self.relay_settings();
        let outcomes = self.inner.relays.connect_to_relays(&settings).await;
        let connected = outcomes.iter().filter(|o| o.is_connected()).count();
        tracing::info!(
            pubkey = %self.inner.pubkey,
            "Loading account with {}/{} relays connected",
            connected,
            outcomes.len()
        );

        self.refresh_all().await
    }

    fn apply_snapshot(&self, snapshot: &AccountSnapshot) {
        let local = [
            (ListKind::Contacts, &snapshot.following, snapshot.following_since),
            (ListKind::Mutes, &snapshot.muted, snapshot.muted_since),
            (ListKind::AllowList, &snapshot.allowlist, snapshot.allowlist_since),
            (ListKind::FilterList, &snapshot.filterlists, snapshot.filterlists_since),
        ];

        let mut loaded = Vec::new();
        {
            let mut state = self.inner.state.lock();
            for (kind, members, since) in local {
                if since.is_none() && members.is_empty() {
                    continue;
                }
                let mut list = TagList::from_members(kind, members, since.unwrap_or(0));
                if kind == ListKind::Mutes {
                    list.content = snapshot.muted_private.clone().unwrap_or_default();
                }
                if state.apply(kind, list) {
                    loaded.push(kind);
                }
            }

            if snapshot.relay_settings_since.is_some() || !snapshot.relay_settings.is_empty() {
                let list = TagList {
                    tags: snapshot.relay_settings.to_relay_list_tags(),
                    content: String::new(),
                    created_at: snapshot.relay_settings_since.unwrap_or(0),
                    event_id: None,
                };
                if state.apply(ListKind::RelayList, list) {
                    loaded.push(ListKind::RelayList);
                }
            }

            *state.emoji_mut() = super::EmojiHistory::from_vec(snapshot.emoji_history.clone());
            state.add_likes(snapshot.likes.iter().cloned());
        }

        tracing::debug!(kinds = loaded.len(), "applied local account snapshot");
        for kind in loaded {
            self.emit(AccountEvent::ListLoaded { kind });
        }
    }

    /// Fetch the latest relay version of every list, then likes. The relay
    /// list goes first so the rest is read from the account's own relays.
    pub async fn refresh_all(&self) -> Result<(), SyncError> {
        self.refresh(ListKind::RelayList).await?;
        for kind in ListKind::ALL {
            if kind != ListKind::RelayList {
                self.refresh(kind).await?;
            }
        }
        self.refresh_likes().await?;
        Ok(())
    }

    /// Fetch the latest version of `kind` and apply it if fresh. Returns
    /// whether local state changed.
    pub async fn refresh(&self, kind: ListKind) -> Result<bool, SyncError> {
        let mut loading = LoadingGuard::begin(&self.inner.state, kind);

        let fetched = self
            .inner
            .relays
            .fetch(kind.filter(self.inner.pubkey), self.inner.fetch_timeout)
            .await?;
        if fetched.timed_out {
            tracing::debug!(%kind, "refresh timed out, using partial results");
        }

        let newest = lists::newest(
            fetched
                .events
                .iter()
                .filter(|e| kind.matches(e, &self.inner.pubkey)),
        );
        let changed = match newest {
            Some(event) => self.apply_list(kind, TagList::from_event(event)),
            None => false,
        };
        loading.settle();
        drop(loading);

        if changed {
            self.emit(AccountEvent::ListLoaded { kind });
            if kind == ListKind::RelayList {
                let settings = self.relay_settings();
                if !settings.is_empty() {
                    self.inner.relays.sync_settings(&settings).await;
                }
            }
        }
        Ok(changed)
    }

    /// Apply `list` to memory and storage if it passes the watermark.
    /// Returns whether the held list changed.
    fn apply_list(&self, kind: ListKind, list: TagList) -> bool {
        let changed = {
            let mut state = self.inner.state.lock();
            let differs = state.list(kind) != Some(&list);
            state.apply(kind, list.clone()) && differs
        };
        if changed {
            self.persist(kind, &list);
        }
        changed
    }

    fn persist(&self, kind: ListKind, list: &TagList) {
        let storage = &self.inner.storage;
        let pubkey = &self.inner.pubkey;
        let since = list.created_at;
        match kind {
            ListKind::Contacts => storage.save_following(pubkey, list.members("p"), since),
            ListKind::Mutes => {
                storage.save_muted(pubkey, list.members("p"), since);
                let private = (!list.content.is_empty()).then(|| list.content.clone());
                storage.save_muted_private(pubkey, private);
            }
            ListKind::AllowList => storage.save_allowlist(pubkey, list.members("p"), since),
            ListKind::FilterList => storage.save_filterlists(pubkey, list.members("p"), since),
            ListKind::RelayList => storage.save_relay_settings(
                pubkey,
                RelaySettings::from_relay_list_tags(&list.tags),
                since,
            ),
        }
    }

    async fn mutate(&self, kind: ListKind, change: Change) -> Result<MutationOutcome, SyncError> {
        let target = change.target();
        let key = PendingKey::List(kind, target.clone());

        let _in_flight = {
            let mut state = self.inner.state.lock();
            if state.is_in_flight(&key) {
                tracing::debug!(%kind, %target, "mutation already in progress");
                return Ok(MutationOutcome::InProgress);
            }
            if state.list(kind).is_some_and(|list| change.is_satisfied_by(list)) {
                return Ok(MutationOutcome::Unchanged);
            }
            match InFlight::begin(&self.inner.state, &mut state, key) {
                Some(guard) => guard,
                None => return Ok(MutationOutcome::InProgress),
            }
        };

        // Edits of one kind run one at a time so each builds on the last
        // published version.
        let _edit = self.inner.edit_locks[kind as usize].lock().await;

        // Edit the freshest version we can find, falling back to the local
        // one.
        let since = self.inner.state.lock().since(kind);
        let fetched = self
            .inner
            .relays
            .fetch(kind.filter(self.inner.pubkey), self.inner.fetch_timeout)
            .await?;
        let fresh = lists::newest(
            fetched
                .events
                .iter()
                .filter(|e| kind.matches(e, &self.inner.pubkey)),
        )
        .filter(|e| is_fresh(since, e.created_at.as_u64()))
        .map(TagList::from_event);

        let base = match fresh {
            Some(list) => {
                if self.apply_list(kind, list.clone()) {
                    self.emit(AccountEvent::ListLoaded { kind });
                }
                list
            }
            None => self
                .inner
                .state
                .lock()
                .list(kind)
                .cloned()
                .unwrap_or_else(|| TagList::empty(kind)),
        };

        if change.is_satisfied_by(&base) {
            return Ok(MutationOutcome::Unchanged);
        }

        let next = change.apply(&base);
        let created_at = Timestamp::now().as_u64().max(base.created_at + 1);
        let builder = next.to_builder(kind, created_at)?;
        let event = self.inner.signer.sign(builder).await?;

        let outcome = self.inner.relays.publish(&event).await?;
        tracing::info!(
            %kind,
            %target,
            event = %event.id,
            "Published list update to {} relays",
            outcome.accepted.len()
        );

        self.apply_list(kind, TagList::from_event(&event));
        let removed = change.removes();
        self.emit(AccountEvent::ListChanged {
            kind,
            removed,
            target: target.clone(),
        });
        Ok(MutationOutcome::Applied { removed, target })
    }

    pub async fn follow(&self, pubkey: &PublicKey) -> Result<MutationOutcome, SyncError> {
        self.mutate(ListKind::Contacts, Change::Add(pubkey.to_hex())).await
    }

    pub async fn unfollow(&self, pubkey: &PublicKey) -> Result<MutationOutcome, SyncError> {
        self.mutate(ListKind::Contacts, Change::Remove(pubkey.to_hex())).await
    }

    pub async fn mute(&self, pubkey: &PublicKey) -> Result<MutationOutcome, SyncError> {
        self.mutate(ListKind::Mutes, Change::Add(pubkey.to_hex())).await
    }

    pub async fn unmute(&self, pubkey: &PublicKey) -> Result<MutationOutcome, SyncError> {
        self.mutate(ListKind::Mutes, Change::Remove(pubkey.to_hex())).await
    }

    pub async fn allow(&self, pubkey: &PublicKey) -> Result<MutationOutcome, SyncError> {
        self.mutate(ListKind::AllowList, Change::Add(pubkey.to_hex())).await
    }

    pub async fn disallow(&self, pubkey: &PublicKey) -> Result<MutationOutcome, SyncError> {
        self.mutate(ListKind::AllowList, Change::Remove(pubkey.to_hex())).await
    }

    /// Subscribe to another account's mute list as a filter.
    pub async fn add_filter_list(&self, pubkey: &PublicKey) -> Result<MutationOutcome, SyncError> {
        self.mutate(ListKind::FilterList, Change::Add(pubkey.to_hex())).await
    }

    pub async fn remove_filter_list(
        &self,
        pubkey: &PublicKey,
    ) -> Result<MutationOutcome, SyncError> {
        self.mutate(ListKind::FilterList, Change::Remove(pubkey.to_hex())).await
    }

    /// Add `url` to the relay list (or change its permissions) and connect
    /// to it. A policy with neither permission removes the relay.
    pub async fn add_relay(
        &self,
        url: RelayUrl,
        policy: RelayPolicy,
    ) -> Result<MutationOutcome, SyncError> {
        if !policy.read && !policy.write {
            return self.remove_relay(&url).await;
        }
        let outcome = self
            .mutate(ListKind::RelayList, Change::SetRelay(url.clone(), policy))
            .await?;
        if matches!(outcome, MutationOutcome::Applied { .. }) {
            let connect = self.inner.relays.add_relay(url, policy).await;
            tracing::debug!(?connect, "relay added");
        }
        Ok(outcome)
    }

    /// Remove `url` from the relay list and close it.
    pub async fn remove_relay(&self, url: &RelayUrl) -> Result<MutationOutcome, SyncError> {
        let outcome = self
            .mutate(ListKind::RelayList, Change::RemoveRelay(url.clone()))
            .await?;
        if matches!(outcome, MutationOutcome::Applied { .. }) {
            self.inner.relays.disconnect(url);
        }
        Ok(outcome)
    }

    /// React `+` to an event. A second like of the same event is a no-op.
    pub async fn like(
        &self,
        event_id: &EventId,
        author: &PublicKey,
    ) -> Result<MutationOutcome, SyncError> {
        let id = event_id.to_hex();
        let key = PendingKey::Like(id.clone());

        let _in_flight = {
            let mut state = self.inner.state.lock();
            if state.is_in_flight(&key) {
                return Ok(MutationOutcome::InProgress);
            }
            if state.has_liked(&id) {
                return Ok(MutationOutcome::Unchanged);
            }
            match InFlight::begin(&self.inner.state, &mut state, key) {
                Some(guard) => guard,
                None => return Ok(MutationOutcome::InProgress),
            }
        };

        let builder = EventBuilder::new(Kind::from(kinds::REACTION), "+")
            .tags([Tag::event(*event_id), Tag::public_key(*author)]);
        let event = self.inner.signer.sign(builder).await?;
        self.inner.relays.publish(&event).await?;

        let likes = {
            let mut state = self.inner.state.lock();
            state.add_likes([id.clone()]);
            state.likes()
        };
        self.inner.storage.save_likes(&self.inner.pubkey, likes);
        self.emit(AccountEvent::Liked {
            event_id: id.clone(),
        });
        Ok(MutationOutcome::Applied {
            removed: false,
            target: id,
        })
    }

    /// Merge the account's published `+` reactions into the likes set.
    /// Returns the number of newly learned likes.
    pub async fn refresh_likes(&self) -> Result<usize, SyncError> {
        let reaction = Kind::from(kinds::REACTION);
        let filter = Filter::new()
            .author(self.inner.pubkey)
            .kind(reaction)
            .limit(LIKES_FETCH_LIMIT);
        let fetched = self.inner.relays.fetch(filter, self.inner.fetch_timeout).await?;

        // NIP-25: the reacted-to event is the last `e` tag.
        let ids: Vec<String> = fetched
            .events
            .iter()
            .filter(|e| e.pubkey == self.inner.pubkey && e.kind == reaction && e.content == "+")
            .filter_map(|e| {
                e.tags
                    .iter()
                    .map(|t| t.as_slice())
                    .filter(|t| t.first().map(String::as_str) == Some("e"))
                    .last()
                    .and_then(|t| t.get(1).cloned())
            })
            .collect();

        let (added, likes) = {
            let mut state = self.inner.state.lock();
            let before = state.likes().len();
            state.add_likes(ids);
            let likes = state.likes();
            (likes.len() - before, likes)
        };
        if added > 0 {
            self.inner.storage.save_likes(&self.inner.pubkey, likes);
        }
        Ok(added)
    }

    /// Move `emoji` to the front of the recently-used list. Returns whether
    /// the history changed.
    pub fn record_emoji(&self, emoji: &str) -> bool {
        let history = {
            let mut state = self.inner.state.lock();
            if !state.emoji_mut().record(emoji) {
                return false;
            }
            state.emoji().to_vec()
        };
        self.inner.storage.save_emoji_history(&self.inner.pubkey, history);
        self.emit(AccountEvent::EmojiHistoryChanged);
        true
    }

    fn members(&self, kind: ListKind) -> Vec<String> {
        self.inner
            .state
            .lock()
            .list(kind)
            .map(|l| l.members(kind.member_tag()))
            .unwrap_or_default()
    }

    fn holds(&self, kind: ListKind, pubkey: &PublicKey) -> bool {
        self.inner
            .state
            .lock()
            .list(kind)
            .is_some_and(|l| l.contains("p", &pubkey.to_hex()))
    }

    pub fn is_following(&self, pubkey: &PublicKey) -> bool {
        self.holds(ListKind::Contacts, pubkey)
    }

    pub fn is_muted(&self, pubkey: &PublicKey) -> bool {
        self.holds(ListKind::Mutes, pubkey)
    }

    pub fn is_allowed(&self, pubkey: &PublicKey) -> bool {
        self.holds(ListKind::AllowList, pubkey)
    }

    /// Followed accounts. Malformed entries are skipped.
    pub fn following(&self) -> Vec<PublicKey> {
        self.members(ListKind::Contacts)
            .iter()
            .filter_map(|pk| PublicKey::parse(pk).ok())
            .collect()
    }

    pub fn muted(&self) -> Vec<String> {
        self.members(ListKind::Mutes)
    }

    pub fn allowlist(&self) -> Vec<String> {
        self.members(ListKind::AllowList)
    }

    pub fn filterlists(&self) -> Vec<String> {
        self.members(ListKind::FilterList)
    }

    /// Relay settings from the relay list, or from the legacy relay map in
    /// the contact list when there is none.
    pub fn relay_settings(&self) -> RelaySettings {
        let state = self.inner.state.lock();
        let from_list = state
            .list(ListKind::RelayList)
            .map(|l| RelaySettings::from_relay_list_tags(&l.tags))
            .unwrap_or_default();
        if !from_list.is_empty() {
            return from_list;
        }
        state
            .list(ListKind::Contacts)
            .filter(|l| !l.content.trim().is_empty())
            .and_then(|l| RelaySettings::from_contact_content(&l.content).ok())
            .unwrap_or_default()
    }

    pub fn phase(&self, kind: ListKind) -> Phase {
        self.inner.state.lock().phase(kind)
    }

    pub fn is_in_progress(&self, kind: ListKind, target: &str) -> bool {
        self.inner
            .state
            .lock()
            .is_in_flight(&PendingKey::List(kind, target.to_string()))
    }

    pub fn has_liked(&self, event_id: &EventId) -> bool {
        self.inner.state.lock().has_liked(&event_id.to_hex())
    }

    pub fn likes(&self) -> Vec<String> {
        self.inner.state.lock().likes()
    }

    pub fn emoji_history(&self) -> Vec<String> {
        self.inner.state.lock().emoji().to_vec()
    }

    /// Current in-memory state in storage form.
    pub fn snapshot(&self) -> AccountSnapshot {
        let state = self.inner.state.lock();
        let members = |kind: ListKind| {
            state
                .list(kind)
                .map(|l| l.members(kind.member_tag()))
                .unwrap_or_default()
        };
        AccountSnapshot {
            relay_settings: state
                .list(ListKind::RelayList)
                .map(|l| RelaySettings::from_relay_list_tags(&l.tags))
                .unwrap_or_default(),
            relay_settings_since: state.since(ListKind::RelayList),
            following: members(ListKind::Contacts),
            following_since: state.since(ListKind::Contacts),
            muted: members(ListKind::Mutes),
            muted_since: state.since(ListKind::Mutes),
            muted_private: state
                .list(ListKind::Mutes)
                .map(|l| l.content.clone())
                .filter(|c| !c.is_empty()),
            allowlist: members(ListKind::AllowList),
            allowlist_since: state.since(ListKind::AllowList),
            filterlists: members(ListKind::FilterList),
            filterlists_since: state.since(ListKind::FilterList),
            emoji_history: state.emoji().to_vec(),
            likes: state.likes(),
        }
    }
}
