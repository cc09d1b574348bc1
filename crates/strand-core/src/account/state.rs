//! In-memory account state: one slot per list kind, likes, emoji history
//! and the set of in-flight mutations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::emoji::EmojiHistory;
use super::lists::{is_fresh, ListKind, TagList};

/// Load phase of one list kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Unloaded,
    Loading,
    Settled,
}

#[derive(Debug, Default)]
struct ListSlot {
    list: Option<TagList>,
    since: Option<u64>,
    phase: Phase,
    /// Phase to return to when the last pending operation ends without
    /// applying anything.
    resting: Phase,
    pending: usize,
}

/// Key of an in-flight mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PendingKey {
    List(ListKind, String),
    Like(String),
}

#[derive(Debug, Default)]
pub(crate) struct AccountState {
    slots: HashMap<ListKind, ListSlot>,
    likes: HashSet<String>,
    emoji: EmojiHistory,
    in_flight: HashSet<PendingKey>,
}

impl AccountState {
    pub fn list(&self, kind: ListKind) -> Option<&TagList> {
        self.slots.get(&kind).and_then(|s| s.list.as_ref())
    }

    pub fn since(&self, kind: ListKind) -> Option<u64> {
        self.slots.get(&kind).and_then(|s| s.since)
    }

    pub fn phase(&self, kind: ListKind) -> Phase {
        self.slots.get(&kind).map(|s| s.phase).unwrap_or_default()
    }

    /// Apply a version of a list if it passes the watermark. Returns whether
    /// state changed.
    pub fn apply(&mut self, kind: ListKind, list: TagList) -> bool {
        let slot = self.slots.entry(kind).or_default();
        if !is_fresh(slot.since, list.created_at) {
            tracing::debug!(
                %kind,
                since = ?slot.since,
                created_at = list.created_at,
                "ignoring stale list"
            );
            return false;
        }
        slot.since = Some(list.created_at);
        slot.list = Some(list);
        slot.resting = Phase::Settled;
        if slot.pending == 0 {
            slot.phase = Phase::Settled;
        }
        true
    }

    /// Enter `Loading` for `kind` until the matching [`Self::end_loading`].
    pub fn begin_loading(&mut self, kind: ListKind) {
        let slot = self.slots.entry(kind).or_default();
        if slot.pending == 0 {
            slot.resting = slot.phase;
        }
        slot.pending += 1;
        slot.phase = Phase::Loading;
    }

    pub fn end_loading(&mut self, kind: ListKind, settled: bool) {
        let slot = self.slots.entry(kind).or_default();
        slot.pending = slot.pending.saturating_sub(1);
        if settled {
            slot.resting = Phase::Settled;
        }
        if slot.pending == 0 {
            slot.phase = slot.resting;
        }
    }

    pub fn is_in_flight(&self, key: &PendingKey) -> bool {
        self.in_flight.contains(key)
    }

    pub fn has_liked(&self, event_id: &str) -> bool {
        self.likes.contains(event_id)
    }

    pub fn add_likes<I: IntoIterator<Item = String>>(&mut self, ids: I) -> bool {
        let before = self.likes.len();
        self.likes.extend(ids);
        self.likes.len() != before
    }

    pub fn likes(&self) -> Vec<String> {
        let mut likes: Vec<String> = self.likes.iter().cloned().collect();
        likes.sort();
        likes
    }

    pub fn emoji(&self) -> &EmojiHistory {
        &self.emoji
    }

    pub fn emoji_mut(&mut self) -> &mut EmojiHistory {
        &mut self.emoji
    }
}

/// Holds `kind` in `Loading` for the duration of a refresh.
pub(crate) struct LoadingGuard {
    state: Arc<Mutex<AccountState>>,
    kind: ListKind,
    settled: bool,
}

impl LoadingGuard {
    pub fn begin(state: &Arc<Mutex<AccountState>>, kind: ListKind) -> Self {
        state.lock().begin_loading(kind);
        Self {
            state: Arc::clone(state),
            kind,
            settled: false,
        }
    }

    /// The refresh completed, whether or not a list was found.
    pub fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.state.lock().end_loading(self.kind, self.settled);
    }
}

/// Marks a mutation as in flight until dropped.
///
/// Dropping clears the marker and leaves `Loading` on every exit path,
/// including errors and cancellation.
pub(crate) struct InFlight {
    state: Arc<Mutex<AccountState>>,
    key: PendingKey,
}

impl InFlight {
    /// Register `key` unless it is already in flight. Must be called with
    /// the state lock held via `guard`.
    pub fn begin(
        state: &Arc<Mutex<AccountState>>,
        guard: &mut AccountState,
        key: PendingKey,
    ) -> Option<Self> {
        if !guard.in_flight.insert(key.clone()) {
            return None;
        }
        if let PendingKey::List(kind, _) = &key {
            guard.begin_loading(*kind);
        }
        Some(Self {
            state: Arc::clone(state),
            key,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.in_flight.remove(&self.key);
        if let PendingKey::List(kind, _) = &self.key {
            state.end_loading(*kind, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_at(created_at: u64) -> TagList {
        let mut list = TagList::empty(ListKind::Contacts);
        list.created_at = created_at;
        list
    }

    #[test]
    fn test_apply_respects_watermark() {
        let mut state = AccountState::default();
        assert_eq!(state.phase(ListKind::Contacts), Phase::Unloaded);

        assert!(state.apply(ListKind::Contacts, list_at(100)));
        assert!(state.apply(ListKind::Contacts, list_at(100)));
        assert!(!state.apply(ListKind::Contacts, list_at(99)));
        assert_eq!(state.since(ListKind::Contacts), Some(100));
        assert_eq!(state.phase(ListKind::Contacts), Phase::Settled);
    }

    #[test]
    fn test_in_flight_guard_clears_on_drop() {
        let shared = Arc::new(Mutex::new(AccountState::default()));
        let key = PendingKey::List(ListKind::Mutes, "pk".to_string());

        let guard = {
            let mut state = shared.lock();
            let guard = InFlight::begin(&shared, &mut state, key.clone());
            assert!(guard.is_some());
            assert!(InFlight::begin(&shared, &mut state, key.clone()).is_none());
            guard
        };
        assert_eq!(shared.lock().phase(ListKind::Mutes), Phase::Loading);

        drop(guard);
        let state = shared.lock();
        assert!(!state.is_in_flight(&key));
        // Nothing was applied, so the kind goes back to where it was.
        assert_eq!(state.phase(ListKind::Mutes), Phase::Unloaded);
    }

    #[test]
    fn test_loading_ends_after_last_pending_operation() {
        let mut state = AccountState::default();
        state.begin_loading(ListKind::Contacts);
        state.begin_loading(ListKind::Contacts);
        assert!(state.apply(ListKind::Contacts, list_at(1)));
        assert_eq!(state.phase(ListKind::Contacts), Phase::Loading);

        state.end_loading(ListKind::Contacts, false);
        assert_eq!(state.phase(ListKind::Contacts), Phase::Loading);
        state.end_loading(ListKind::Contacts, false);
        assert_eq!(state.phase(ListKind::Contacts), Phase::Settled);
    }
}
