//! Application-wide constants
//!
//! Centralized location for relay defaults, protocol limits and the event
//! kinds the account layer reads and writes.

use std::time::Duration;

/// Relays used when an account has no relay settings and the default-relay
/// endpoint cannot be reached.
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.primal.net",
    "wss://relay.damus.io",
    "wss://nos.lol",
];

/// Environment variable holding the comma-separated priority relay list.
pub const PRIORITY_RELAYS_ENV: &str = "STRAND_PRIORITY_RELAYS";

/// Environment variable pointing at the default-relay list endpoint.
pub const DEFAULT_RELAYS_URL_ENV: &str = "STRAND_DEFAULT_RELAYS_URL";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "STRAND_DATA_DIR";

// Relay connection defaults
/// Base unit for connect timeouts, linear backoff and the stability window.
pub const RELAY_BASE_TIMEOUT: Duration = Duration::from_millis(3_000);
/// Consecutive failed attempts after which a relay is given up on.
pub const RELAY_MAX_ATTEMPTS: u32 = 10;
/// How long a publish waits for OK replies.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(8);
/// How long a fetch waits for EOSE before the subscription is forcibly closed.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Emoji history is most-recently-used first and capped at this length.
pub const EMOJI_HISTORY_LIMIT: usize = 40;

/// Number of reactions fetched when rebuilding the likes set.
pub const LIKES_FETCH_LIMIT: usize = 500;

// Seen-notes filter sizing
pub const SEEN_FILTER_CAPACITY: usize = 10_000;
pub const SEEN_FILTER_FP_RATE: f64 = 0.001;

// Nostr event kinds used by the account layer
pub mod kinds {
    /// Contact list (follows)
    pub const CONTACT_LIST: u16 = 3;
    /// Reaction (likes)
    pub const REACTION: u16 = 7;
    /// Mute list
    pub const MUTE_LIST: u16 = 10000;
    /// NIP-65 relay list
    pub const RELAY_LIST: u16 = 10002;
    /// Categorized people list, addressed by `d` tag
    pub const PEOPLE_LIST: u16 = 30000;
}

/// `d` tag of the allow list (people-list kind).
pub const ALLOWLIST_D_TAG: &str = "allowlist";
/// `d` tag of the subscribed filter lists (people-list kind).
pub const FILTERLISTS_D_TAG: &str = "mutelists";
