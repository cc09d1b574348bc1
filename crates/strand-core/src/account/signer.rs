use futures::future::BoxFuture;
use nostr::{Event, EventBuilder, Keys, PublicKey};

use super::SyncError;

/// Signs events on behalf of the account.
///
/// Remote signers may prompt the user, so signing is async. A refusal is
/// reported as [`SyncError::Signing`] and never retried.
pub trait EventSigner: Send + Sync + 'static {
    fn public_key(&self) -> PublicKey;
    fn sign(&self, builder: EventBuilder) -> BoxFuture<'_, Result<Event, SyncError>>;
}

impl EventSigner for Keys {
    fn public_key(&self) -> PublicKey {
        Keys::public_key(self)
    }

    fn sign(&self, builder: EventBuilder) -> BoxFuture<'_, Result<Event, SyncError>> {
        Box::pin(async move {
            builder
                .sign_with_keys(self)
                .map_err(|e| SyncError::Signing(e.to_string()))
        })
    }
}
