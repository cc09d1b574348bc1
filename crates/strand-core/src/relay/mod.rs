pub mod defaults;
pub mod manager;
pub mod message;
pub mod settings;
pub mod subscription;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use defaults::{DefaultRelaySource, HttpDefaultRelays, StaticDefaultRelays};
pub use manager::{
    ConnectOutcome, ConnectionState, PublishOutcome, Relay, RelayManager, RelayOptions,
    RelayStatusEvent,
};
pub use message::{IncomingMessage, OutgoingMessage};
pub use settings::{RelayPolicy, RelaySettings, RelayUrl};
pub use subscription::{FetchResult, Subscription, SubscriptionMessage, SubscriptionRouter};
pub use transport::{Connector, RelayChannel, TransportError, WebSocketConnector};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid relay url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: &'static str },

    #[error("No connected relays available for {0}")]
    NoRelays(&'static str),

    #[error("Event {event_id} was not accepted by any relay")]
    Rejected {
        event_id: String,
        replies: Vec<(RelayUrl, String)>,
    },

    #[error("Relay manager has been torn down")]
    Shutdown,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
