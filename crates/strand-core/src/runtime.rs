use std::sync::Arc;

use parking_lot::Mutex;

use crate::account::{AccountSync, EventSigner, SyncError};
use crate::config::CoreConfig;
use crate::feed::SeenNotesFilter;
use crate::relay::{
    Connector, DefaultRelaySource, HttpDefaultRelays, RelayManager, StaticDefaultRelays,
    WebSocketConnector,
};
use crate::stats::RelayStats;
use crate::storage::AccountStorage;

/// Everything one signed-in account needs: the relay pool, the account
/// sync state machine on top of it, and the seen-notes filter.
pub struct Session {
    config: CoreConfig,
    relays: RelayManager,
    account: AccountSync,
    seen: Mutex<SeenNotesFilter>,
}

impl Session {
    /// Build a session that talks to real relays over WebSocket and keeps
    /// account state under the configured data directory.
    pub fn start(config: CoreConfig, signer: Arc<dyn EventSigner>) -> Self {
        let defaults: Arc<dyn DefaultRelaySource> = match &config.default_relays_url {
            Some(url) => Arc::new(HttpDefaultRelays::new(url.clone())),
            None => Arc::new(StaticDefaultRelays::builtin()),
        };
        let storage = AccountStorage::on_disk(config.storage_dir());
        Self::with_connector(config, signer, Arc::new(WebSocketConnector), defaults, storage)
    }

    pub fn with_connector(
        config: CoreConfig,
        signer: Arc<dyn EventSigner>,
        connector: Arc<dyn Connector>,
        defaults: Arc<dyn DefaultRelaySource>,
        storage: AccountStorage,
    ) -> Self {
        let relays = RelayManager::new(connector, defaults, config.relay.clone());
        let account = AccountSync::new(signer, relays.clone(), storage, config.fetch_timeout);
        tracing::info!(
            pubkey = %account.public_key(),
            data_dir = %config.data_dir.display(),
            "Session started"
        );
        Self {
            config,
            relays,
            account,
            seen: Mutex::new(SeenNotesFilter::default()),
        }
    }

    /// Restore the account from storage, connect and refresh from relays.
    pub async fn load(&self) -> Result<(), SyncError> {
        self.account.load().await
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn account(&self) -> &AccountSync {
        &self.account
    }

    pub fn relays(&self) -> &RelayManager {
        &self.relays
    }

    pub fn seen(&self) -> &Mutex<SeenNotesFilter> {
        &self.seen
    }

    pub fn relay_stats(&self) -> RelayStats {
        self.relays.stats().snapshot()
    }

    /// Close every relay. The session cannot reconnect afterwards.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down session");
        self.relays.teardown();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.relays.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::mock::MockNetwork;
    use crate::relay::RelayUrl;
    use nostr::Keys;

    #[tokio::test(start_paused = true)]
    async fn test_session_persists_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let network = MockNetwork::new();
        let relay = network.relay("wss://relay.example");
        let relay_url = RelayUrl::parse("wss://relay.example").unwrap();
        let defaults = Arc::new(StaticDefaultRelays(vec![relay_url.clone()]));
        let keys = Keys::generate();
        let friend = Keys::generate().public_key();
        let config = CoreConfig::new(dir.path());

        {
            let session = Session::with_connector(
                config.clone(),
                Arc::new(keys.clone()),
                network.clone(),
                defaults.clone(),
                AccountStorage::on_disk(config.storage_dir()),
            );
            session.load().await.unwrap();
            session.account().follow(&friend).await.unwrap();
            assert_eq!(relay.published().len(), 1);
            assert!(session.relay_stats().by_relay.contains_key("wss://relay.example"));
            session.shutdown();
            assert!(!session.relays().is_connected(&relay_url));
        }

        // The relay goes away; the follow survives in storage.
        relay.set_refuse(true);
        let session = Session::with_connector(
            config.clone(),
            Arc::new(keys),
            network,
            defaults,
            AccountStorage::on_disk(config.storage_dir()),
        );
        let _ = session.load().await;
        assert!(session.account().is_following(&friend));
    }

    #[tokio::test]
    async fn test_seen_filter_is_shared() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::with_connector(
            CoreConfig::new(dir.path()),
            Arc::new(Keys::generate()),
            MockNetwork::new(),
            Arc::new(StaticDefaultRelays(Vec::new())),
            AccountStorage::in_memory(),
        );
        let id = nostr::EventId::from_byte_array([7; 32]);
        assert!(session.seen().lock().insert(&id));
        assert!(session.seen().lock().contains(&id));
    }
}
