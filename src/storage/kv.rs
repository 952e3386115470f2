use std::collections::HashMap as StdHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};
use crate::identity::SessionKey;

/// Keyed persistence for one serialized session record per authority identity.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &SessionKey) -> AuthResult<Option<String>>;
    async fn set(&self, key: &SessionKey, record: String) -> AuthResult<()>;
    async fn remove(&self, key: &SessionKey) -> AuthResult<()>;
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct StoreSettings {
    pub name: String,
    /// Entries unused for this long are dropped. Every successful read resets the clock.
    #[serde(default)]
    pub idle_ttl_secs: Option<u64>,
    #[serde(default)]
    pub persistence: Option<PersistenceSettings>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct PersistenceSettings {
    /// JSON snapshot rewritten after every mutation.
    pub path: PathBuf,
}

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

#[derive(Serialize, Deserialize)]
struct SnapEntry { key: String, value: String }

#[derive(Serialize, Deserialize)]
struct Snapshot { version: u32, entries: Vec<SnapEntry> }

/// In-memory session store with optional idle expiry and snapshot file.
#[derive(Clone)]
pub struct KvSessionStore {
    settings: StoreSettings,
    map: Arc<parking_lot::RwLock<StdHashMap<String, Entry>>>,
}

impl Default for KvSessionStore {
    fn default() -> Self { Self::new(StoreSettings { name: "session".into(), ..Default::default() }) }
}

impl KvSessionStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self { settings, map: Arc::new(parking_lot::RwLock::new(StdHashMap::new())) }
    }

    /// Store backed by a snapshot file; existing entries are loaded right away.
    pub fn with_snapshot(path: impl AsRef<Path>, idle_ttl: Option<Duration>) -> AuthResult<Self> {
        let settings = StoreSettings {
            name: "session".into(),
            idle_ttl_secs: idle_ttl.map(|d| d.as_secs()),
            persistence: Some(PersistenceSettings { path: path.as_ref().to_path_buf() }),
        };
        let s = Self::new(settings);
        s.load_snapshot()?;
        Ok(s)
    }

    fn idle_ttl(&self) -> Option<Duration> { self.settings.idle_ttl_secs.map(Duration::from_secs) }

    fn snapshot_path(&self) -> Option<&Path> { self.settings.persistence.as_ref().map(|p| p.path.as_path()) }

    /// Load the snapshot file into memory. A missing file is not an error.
    pub fn load_snapshot(&self) -> AuthResult<()> {
        let Some(path) = self.snapshot_path() else { return Ok(()); };
        if !path.exists() { return Ok(()); }
        let bytes = std::fs::read(path).map_err(|e| AuthError::store("snapshot_read", e.to_string()))?;
        let snap: Snapshot = serde_json::from_slice(&bytes).map_err(|e| AuthError::store("snapshot_parse", e.to_string()))?;
        let expires_at = self.idle_ttl().map(|d| Instant::now() + d);
        let mut w = self.map.write();
        w.clear();
        for e in snap.entries {
            w.insert(e.key, Entry { value: e.value, expires_at });
        }
        debug!(target: "gallery_auth::store", "loaded {} session record(s) from {}", w.len(), path.display());
        Ok(())
    }

    fn save_snapshot(&self) -> AuthResult<()> {
        let Some(path) = self.snapshot_path() else { return Ok(()); };
        let entries = self.map.read().iter()
            .map(|(k, v)| SnapEntry { key: k.clone(), value: v.value.clone() })
            .collect();
        let bytes = serde_json::to_vec_pretty(&Snapshot { version: 1, entries })
            .map_err(|e| AuthError::store("snapshot_serialize", e.to_string()))?;
        if let Some(dir) = path.parent() { std::fs::create_dir_all(dir).ok(); }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(|e| AuthError::store("snapshot_write", e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| AuthError::store("snapshot_write", e.to_string()))?;
        Ok(())
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut w = self.map.write();
        let expired = match w.get(key) {
            None => return None,
            Some(ent) => ent.expires_at.map(|exp| now >= exp).unwrap_or(false),
        };
        if expired {
            w.remove(key);
            return None;
        }
        let ttl = self.idle_ttl();
        let ent = w.get_mut(key)?;
        if let Some(ttl) = ttl { ent.expires_at = Some(now + ttl); }
        Some(ent.value.clone())
    }

    /// Insert or replace an entry. If the snapshot cannot be written the
    /// previous entry is put back and the error returned.
    pub fn set_raw(&self, key: impl Into<String>, value: String) -> AuthResult<()> {
        let key = key.into();
        let expires_at = self.idle_ttl().map(|d| Instant::now() + d);
        let previous = self.map.write().insert(key.clone(), Entry { value, expires_at });
        self.save_snapshot().inspect_err(|_| self.restore_entry(key, previous))
    }

    /// Remove an entry. If the snapshot cannot be written the entry is kept.
    pub fn delete_raw(&self, key: &str) -> AuthResult<bool> {
        let Some(previous) = self.map.write().remove(key) else { return Ok(false); };
        self.save_snapshot().inspect_err(|_| self.restore_entry(key.to_string(), Some(previous)))?;
        Ok(true)
    }

    fn restore_entry(&self, key: String, previous: Option<Entry>) {
        let mut w = self.map.write();
        match previous {
            Some(ent) => { w.insert(key, ent); }
            None => { w.remove(&key); }
        }
    }

    pub fn len(&self) -> usize { self.map.read().len() }

    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }

    pub fn keys(&self) -> Vec<String> { self.map.read().keys().cloned().collect() }

    /// Remove expired entries. Returns number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut w = self.map.write();
        let before = w.len();
        w.retain(|_, v| v.expires_at.map(|exp| now < exp).unwrap_or(true));
        before - w.len()
    }

    /// End of the browsing session: forget every record and drop the snapshot.
    pub fn end_session(&self) -> AuthResult<()> {
        self.map.write().clear();
        if let Some(path) = self.snapshot_path() {
            if path.exists() {
                std::fs::remove_file(path).map_err(|e| AuthError::store("snapshot_remove", e.to_string()))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for KvSessionStore {
    async fn get(&self, key: &SessionKey) -> AuthResult<Option<String>> {
        Ok(self.get_raw(&key.storage_key()))
    }

    async fn set(&self, key: &SessionKey, record: String) -> AuthResult<()> {
        self.set_raw(key.storage_key(), record).inspect_err(|e| {
            warn!(target: "gallery_auth::store", "persisting {} failed: {}", key, e);
        })
    }

    async fn remove(&self, key: &SessionKey) -> AuthResult<()> {
        self.delete_raw(&key.storage_key()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Realm;

    fn key() -> SessionKey { SessionKey::new("user", Realm::for_mode(false)) }

    #[tokio::test]
    async fn set_get_remove() {
        let store = KvSessionStore::default();
        assert_eq!(store.get(&key()).await.unwrap(), None);
        store.set(&key(), "{\"key\":\"amy\"}".into()).await.unwrap();
        assert_eq!(store.get(&key()).await.unwrap().as_deref(), Some("{\"key\":\"amy\"}"));
        assert_eq!(store.keys(), vec!["session:user:hbrsinfkaul".to_string()]);
        store.remove(&key()).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn idle_entries_expire() {
        let store = KvSessionStore::new(StoreSettings { name: "s".into(), idle_ttl_secs: Some(0), persistence: None });
        store.set(&key(), "x".into()).await.unwrap();
        assert_eq!(store.get(&key()).await.unwrap(), None);
        store.set(&key(), "y".into()).await.unwrap();
        assert_eq!(store.sweep(), 1);
    }

    #[tokio::test]
    async fn snapshot_survives_reload_until_session_end() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sessions.json");
        let first = KvSessionStore::with_snapshot(&path, None).unwrap();
        first.set(&key(), "rec".into()).await.unwrap();
        drop(first);

        let second = KvSessionStore::with_snapshot(&path, None).unwrap();
        assert_eq!(second.get(&key()).await.unwrap().as_deref(), Some("rec"));
        second.end_session().unwrap();
        assert!(!path.exists());

        let third = KvSessionStore::with_snapshot(&path, None).unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn failed_snapshot_write_leaves_map_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let store = KvSessionStore::with_snapshot(blocker.join("sessions.json"), None).unwrap();

        assert!(store.set(&key(), "rec".into()).await.is_err());
        assert!(store.is_empty());
        assert_eq!(store.get(&key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_snapshot_write_keeps_deleted_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("state");
        let store = KvSessionStore::with_snapshot(dir.join("sessions.json"), None).unwrap();
        store.set(&key(), "rec".into()).await.unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, b"not a directory").unwrap();
        assert!(store.remove(&key()).await.is_err());
        assert_eq!(store.get(&key()).await.unwrap().as_deref(), Some("rec"));
    }
}
