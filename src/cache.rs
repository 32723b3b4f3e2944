//! Persisted inventory snapshot, keyed by the device that produced it.
//!
//! Reads never fail: an unreadable or corrupt store is treated as empty.
//! Writes replace the whole snapshot and are serialized through one lock.
use crate::error::CacheIoError;
use crate::models::{CacheSnapshot, InventoryItem};
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use tokio::sync::Mutex;

const SNAPSHOT_KEY: &str = "apps-cache";

/// Minimal persistence port: whole values stored under string keys.
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, CacheIoError>;
    fn store(&self, key: &str, value: &str) -> Result<(), CacheIoError>;
    /// Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), CacheIoError>;
}

/// One JSON file per key inside `dir`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, CacheIoError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, key: &str, value: &str) -> Result<(), CacheIoError> {
        fs::create_dir_all(&self.dir)?;
        // Write beside the target and rename so readers never see a partial file.
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)?;
        temp.write_all(value.as_bytes())?;
        temp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheIoError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: std::sync::Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, CacheIoError> {
        Ok(self.values().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), CacheIoError> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheIoError> {
        self.values().remove(key);
        Ok(())
    }
}

pub struct InventoryCache {
    store: Box<dyn KeyValueStore>,
    validity: chrono::Duration,
    write_lock: Mutex<()>,
}

impl InventoryCache {
    pub fn new(store: impl KeyValueStore + 'static, validity: chrono::Duration) -> Self {
        Self {
            store: Box::new(store),
            validity,
            write_lock: Mutex::new(()),
        }
    }

    /// The persisted snapshot, or an empty one if none can be read.
    pub fn load_snapshot(&self) -> CacheSnapshot {
        let raw = match self.store.load(SNAPSHOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return CacheSnapshot::default(),
            Err(e) => {
                log::warn!("[CACHE] Failed to read snapshot, treating as empty: {}", e);
                return CacheSnapshot::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("[CACHE] Corrupt snapshot, treating as empty: {}", e);
            CacheSnapshot::default()
        })
    }

    /// The snapshot if it belongs to `serial` and is inside the validity window.
    pub fn valid_snapshot(&self, serial: &str) -> Option<CacheSnapshot> {
        let snapshot = self.load_snapshot();
        if snapshot.is_valid_for(serial, Utc::now(), self.validity) {
            log::info!(
                "[CACHE] Using cached data for {} ({} apps)",
                serial,
                snapshot.items.len()
            );
            Some(snapshot)
        } else {
            log::info!("[CACHE] No valid snapshot for {}", serial);
            None
        }
    }

    /// A single cached record, judged by its own stamp when it has one.
    pub fn cached_item(&self, serial: &str, identifier: &str) -> Option<InventoryItem> {
        let snapshot = self.load_snapshot();
        if snapshot.owner_device_serial.as_deref() != Some(serial) {
            return None;
        }
        let item = snapshot.items.get(identifier)?;
        let stamped_at = item.cached_at.unwrap_or(snapshot.last_updated);
        let age_ms = Utc::now().timestamp_millis() - stamped_at;
        (stamped_at > 0 && age_ms < self.validity.num_milliseconds()).then(|| item.clone())
    }

    /// Replaces the snapshot with `items` owned by `serial`.
    pub async fn save_snapshot(&self, serial: &str, items: &[InventoryItem]) -> Result<(), CacheIoError> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = CacheSnapshot::for_device(serial, Utc::now());
        for item in items {
            snapshot
                .items
                .insert(item.identifier.clone(), item.clone());
        }
        self.write_snapshot(&snapshot)?;
        log::info!("[CACHE] Saved {} apps for {}", snapshot.items.len(), serial);
        Ok(())
    }

    /// Inserts or replaces one record, stamping it with `cachedAt`.
    ///
    /// A snapshot owned by another device is discarded first. The snapshot's
    /// own timestamp is left alone, so a single upsert never makes a partial
    /// snapshot look like a complete, fresh listing.
    pub async fn upsert_item(&self, serial: &str, item: &InventoryItem) -> Result<(), CacheIoError> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let mut snapshot = self.load_snapshot();
        if snapshot.owner_device_serial.as_deref() != Some(serial) {
            snapshot = CacheSnapshot {
                owner_device_serial: Some(serial.to_string()),
                ..CacheSnapshot::default()
            };
        }

        let mut item = item.clone();
        item.cached_at = Some(now.timestamp_millis());
        snapshot.items.insert(item.identifier.clone(), item);
        self.write_snapshot(&snapshot)
    }

    /// Drops `identifiers` from the snapshot if it belongs to `serial`.
    pub async fn remove_items(&self, serial: &str, identifiers: &[String]) -> Result<(), CacheIoError> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.load_snapshot();
        if snapshot.owner_device_serial.as_deref() != Some(serial) {
            return Ok(());
        }

        let before = snapshot.items.len();
        for identifier in identifiers {
            snapshot.items.remove(identifier);
        }
        if snapshot.items.len() == before {
            return Ok(());
        }
        log::info!(
            "[CACHE] Removed {} apps from cache",
            before - snapshot.items.len()
        );
        self.write_snapshot(&snapshot)
    }

    /// Deletes the persisted snapshot. Safe to call when nothing is stored.
    pub async fn clear(&self) -> Result<(), CacheIoError> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(SNAPSHOT_KEY)?;
        log::info!("[CACHE] Cache cleared");
        Ok(())
    }

    /// Writes `snapshot` as-is. Callers own the timestamp and owner fields.
    pub fn write_snapshot(&self, snapshot: &CacheSnapshot) -> Result<(), CacheIoError> {
        let content = serde_json::to_string_pretty(snapshot)?;
        self.store.store(SNAPSHOT_KEY, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InventoryItem;

    fn item(identifier: &str) -> InventoryItem {
        InventoryItem::degraded(identifier, identifier.to_string(), "test")
    }

    fn cache() -> InventoryCache {
        InventoryCache::new(MemoryStore::new(), chrono::Duration::hours(24))
    }

    #[test]
    fn file_store_round_trip_and_idempotent_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.load("k").unwrap(), None);
        store.store("k", "{\"a\":1}").unwrap();
        assert_eq!(store.load("k").unwrap().as_deref(), Some("{\"a\":1}"));
        assert!(dir.path().join("nested").join("k.json").is_file());

        store.delete("k").unwrap();
        store.delete("k").unwrap();
        assert_eq!(store.load("k").unwrap(), None);
    }

    #[test]
    fn corrupt_snapshot_reads_as_empty() {
        let store = MemoryStore::new();
        store.store(SNAPSHOT_KEY, "{ not json").unwrap();
        let cache = InventoryCache::new(store, chrono::Duration::hours(24));
        assert_eq!(cache.load_snapshot(), CacheSnapshot::default());
        assert!(cache.valid_snapshot("SER1").is_none());
    }

    #[tokio::test]
    async fn saved_snapshot_is_valid_only_for_its_owner() {
        let cache = cache();
        cache
            .save_snapshot("SER1", &[item("com.a.one"), item("com.a.two")])
            .await
            .unwrap();

        let snapshot = cache.valid_snapshot("SER1").unwrap();
        assert_eq!(snapshot.items.len(), 2);
        assert!(cache.valid_snapshot("SER2").is_none());
    }

    #[tokio::test]
    async fn stale_snapshot_is_rejected() {
        let cache = cache();
        let mut snapshot = CacheSnapshot::for_device("SER1", Utc::now() - chrono::Duration::hours(25));
        snapshot.items.insert("com.a.one".to_string(), item("com.a.one"));
        cache.write_snapshot(&snapshot).unwrap();

        assert!(cache.valid_snapshot("SER1").is_none());
        assert!(cache.cached_item("SER1", "com.a.one").is_none());
    }

    #[tokio::test]
    async fn upsert_stamps_item_without_validating_snapshot() {
        let cache = cache();
        cache.save_snapshot("OTHER", &[item("com.a.one")]).await.unwrap();
        cache.upsert_item("SER1", &item("com.a.two")).await.unwrap();

        let snapshot = cache.load_snapshot();
        assert_eq!(snapshot.owner_device_serial.as_deref(), Some("SER1"));
        assert_eq!(snapshot.items.len(), 1);
        assert!(cache.valid_snapshot("SER1").is_none());

        let cached = cache.cached_item("SER1", "com.a.two").unwrap();
        assert!(cached.cached_at.is_some());
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let cache = cache();
        cache
            .save_snapshot("SER1", &[item("com.a.one"), item("com.a.two")])
            .await
            .unwrap();
        cache
            .remove_items("SER1", &["com.a.one".to_string()])
            .await
            .unwrap();
        assert_eq!(cache.load_snapshot().items.len(), 1);

        cache.clear().await.unwrap();
        cache.clear().await.unwrap();
        assert_eq!(cache.load_snapshot(), CacheSnapshot::default());
    }
}
