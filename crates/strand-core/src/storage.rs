//! Per-account local persistence.
//!
//! Everything the account layer caches locally lives in one JSON document
//! per account, stored under the key `account_<pubkey hex>`. Reads are
//! synchronous. Writes never fail the caller: errors are logged and the
//! in-memory state stays authoritative until the next successful write.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nostr::PublicKey;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::relay::RelaySettings;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key/value store for JSON documents.
pub trait StorageBackend: Send + Sync + 'static {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write-to-temp-then-rename so a crash mid-write never leaves a
    /// truncated document behind.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, value)?;
        fs::rename(&temp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Locally cached account state. Pubkeys and event ids are lowercase hex;
/// `*_since` fields are the `created_at` of the list version they came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSnapshot {
    pub relay_settings: RelaySettings,
    pub relay_settings_since: Option<u64>,
    pub following: Vec<String>,
    pub following_since: Option<u64>,
    pub muted: Vec<String>,
    pub muted_since: Option<u64>,
    /// Encrypted private mute entries, kept as-is.
    pub muted_private: Option<String>,
    pub allowlist: Vec<String>,
    pub allowlist_since: Option<u64>,
    pub filterlists: Vec<String>,
    pub filterlists_since: Option<u64>,
    pub emoji_history: Vec<String>,
    pub likes: Vec<String>,
}

/// Typed access to per-account snapshots.
#[derive(Clone)]
pub struct AccountStorage {
    backend: Arc<dyn StorageBackend>,
    // Serializes read-modify-write of a snapshot.
    write_lock: Arc<Mutex<()>>,
}

impl AccountStorage {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn on_disk<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(Arc::new(FileBackend::new(dir)))
    }

    fn key(pubkey: &PublicKey) -> String {
        format!("account_{}", pubkey.to_hex())
    }

    /// Load the snapshot for `pubkey`. Missing or unreadable data yields
    /// an empty snapshot.
    pub fn get_storage(&self, pubkey: &PublicKey) -> AccountSnapshot {
        let key = Self::key(pubkey);
        let raw = match self.backend.read(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return AccountSnapshot::default(),
            Err(e) => {
                tracing::warn!(%key, error = %e, "failed to read account storage");
                return AccountSnapshot::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(%key, error = %e, "discarding unreadable account storage");
            AccountSnapshot::default()
        })
    }

    fn update<F>(&self, pubkey: &PublicKey, apply: F)
    where
        F: FnOnce(&mut AccountSnapshot),
    {
        let _guard = self.write_lock.lock();
        let mut snapshot = self.get_storage(pubkey);
        apply(&mut snapshot);

        let key = Self::key(pubkey);
        let result = serde_json::to_string(&snapshot)
            .map_err(StorageError::from)
            .and_then(|json| self.backend.write(&key, &json));
        if let Err(e) = result {
            tracing::warn!(%key, error = %e, "failed to write account storage");
        }
    }

    pub fn save_following(&self, pubkey: &PublicKey, following: Vec<String>, since: u64) {
        self.update(pubkey, |s| {
            s.following = following;
            s.following_since = Some(since);
        });
    }

    pub fn save_muted(&self, pubkey: &PublicKey, muted: Vec<String>, since: u64) {
        self.update(pubkey, |s| {
            s.muted = muted;
            s.muted_since = Some(since);
        });
    }

    pub fn save_muted_private(&self, pubkey: &PublicKey, content: Option<String>) {
        self.update(pubkey, |s| s.muted_private = content);
    }

    pub fn save_allowlist(&self, pubkey: &PublicKey, allowlist: Vec<String>, since: u64) {
        self.update(pubkey, |s| {
            s.allowlist = allowlist;
            s.allowlist_since = Some(since);
        });
    }

    pub fn save_filterlists(&self, pubkey: &PublicKey, filterlists: Vec<String>, since: u64) {
        self.update(pubkey, |s| {
            s.filterlists = filterlists;
            s.filterlists_since = Some(since);
        });
    }

    pub fn save_relay_settings(&self, pubkey: &PublicKey, settings: RelaySettings, since: u64) {
        self.update(pubkey, |s| {
            s.relay_settings = settings;
            s.relay_settings_since = Some(since);
        });
    }

    pub fn save_emoji_history(&self, pubkey: &PublicKey, history: Vec<String>) {
        self.update(pubkey, |s| s.emoji_history = history);
    }

    pub fn save_likes(&self, pubkey: &PublicKey, likes: Vec<String>) {
        self.update(pubkey, |s| s.likes = likes);
    }

    /// Forget everything stored for `pubkey`.
    pub fn clear(&self, pubkey: &PublicKey) {
        let key = Self::key(pubkey);
        if let Err(e) = self.backend.remove(&key) {
            tracing::warn!(%key, error = %e, "failed to clear account storage");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{RelayPolicy, RelayUrl};
    use nostr::Keys;
    use tempfile::tempdir;

    struct FailingBackend;

    impl StorageBackend for FailingBackend {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = AccountStorage::on_disk(dir.path());
        let pubkey = Keys::generate().public_key();
        let friend = Keys::generate().public_key().to_hex();

        let mut relays = RelaySettings::new();
        relays.insert(RelayUrl::parse("wss://a.example").unwrap(), RelayPolicy::new(true, false));

        storage.save_following(&pubkey, vec![friend.clone()], 100);
        storage.save_muted(&pubkey, vec!["aa".repeat(32)], 101);
        storage.save_muted_private(&pubkey, Some("ciphertext".to_string()));
        storage.save_relay_settings(&pubkey, relays.clone(), 102);
        storage.save_emoji_history(&pubkey, vec!["🤙".to_string()]);
        storage.save_likes(&pubkey, vec!["bb".repeat(32)]);

        // A fresh handle over the same directory sees everything.
        let reopened = AccountStorage::on_disk(dir.path());
        let snapshot = reopened.get_storage(&pubkey);
        assert_eq!(snapshot.following, vec![friend]);
        assert_eq!(snapshot.following_since, Some(100));
        assert_eq!(snapshot.muted_since, Some(101));
        assert_eq!(snapshot.muted_private.as_deref(), Some("ciphertext"));
        assert_eq!(snapshot.relay_settings, relays);
        assert_eq!(snapshot.relay_settings_since, Some(102));
        assert_eq!(snapshot.emoji_history, vec!["🤙".to_string()]);
        assert_eq!(snapshot.likes.len(), 1);
        assert!(snapshot.allowlist_since.is_none());

        assert!(dir
            .path()
            .join(format!("account_{}.json", pubkey.to_hex()))
            .exists());
    }

    #[test]
    fn test_accounts_are_namespaced() {
        let storage = AccountStorage::in_memory();
        let alice = Keys::generate().public_key();
        let bob = Keys::generate().public_key();

        storage.save_allowlist(&alice, vec!["x".to_string()], 5);
        assert_eq!(storage.get_storage(&alice).allowlist, vec!["x".to_string()]);
        assert_eq!(storage.get_storage(&bob), AccountSnapshot::default());

        storage.clear(&alice);
        assert_eq!(storage.get_storage(&alice), AccountSnapshot::default());
    }

    #[test]
    fn test_corrupt_document_reads_as_empty() {
        let backend = Arc::new(MemoryBackend::new());
        let pubkey = Keys::generate().public_key();
        backend
            .write(&format!("account_{}", pubkey.to_hex()), "{not json")
            .unwrap();

        let storage = AccountStorage::new(backend);
        assert_eq!(storage.get_storage(&pubkey), AccountSnapshot::default());
    }

    #[test]
    fn test_write_failures_are_absorbed() {
        let storage = AccountStorage::new(Arc::new(FailingBackend));
        let pubkey = Keys::generate().public_key();
        storage.save_filterlists(&pubkey, vec!["y".to_string()], 1);
        assert!(storage.get_storage(&pubkey).filterlists.is_empty());
    }

    #[test]
    fn test_missing_fields_default() {
        let snapshot: AccountSnapshot = serde_json::from_str(r#"{"following":["ab"]}"#).unwrap();
        assert_eq!(snapshot.following, vec!["ab".to_string()]);
        assert!(snapshot.relay_settings.is_empty());
    }
}
