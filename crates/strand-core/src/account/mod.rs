//! Account synchronization: the user's lists, likes and emoji history,
//! merged between local storage and relays.

pub mod emoji;
pub mod lists;
pub mod signer;
pub mod state;
pub mod sync;

pub use emoji::EmojiHistory;
pub use lists::{ListKind, TagList};
pub use signer::EventSigner;
pub use state::Phase;
pub use sync::AccountSync;

use serde::Serialize;

use crate::relay::RelayError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Invalid tag: {0}")]
    InvalidTag(String),
}

/// Result of a list mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MutationOutcome {
    /// A new list version was published and applied.
    Applied { removed: bool, target: String },
    /// State already matched the request; nothing was published.
    Unchanged,
    /// The same change is already being made.
    InProgress,
}

/// Change notifications for the account's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    /// A local mutation was published and applied.
    ListChanged {
        kind: ListKind,
        removed: bool,
        target: String,
    },
    /// A newer list version arrived from relays or storage.
    ListLoaded { kind: ListKind },
    Liked { event_id: String },
    EmojiHistoryChanged,
}
