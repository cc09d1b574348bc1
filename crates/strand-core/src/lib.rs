pub mod account;
pub mod config;
pub mod constants;
pub mod feed;
pub mod relay;
pub mod runtime;
pub mod stats;
pub mod storage;
pub mod tracing_setup;

pub use account::{AccountEvent, AccountSync, EventSigner, ListKind, MutationOutcome, SyncError};
pub use config::CoreConfig;
pub use relay::{RelayError, RelayManager, RelayPolicy, RelaySettings, RelayUrl};
pub use runtime::Session;
pub use storage::{AccountSnapshot, AccountStorage};
