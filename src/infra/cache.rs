//! Expiring key-value cache over a pluggable storage backend
//!
//! Entries carry an absolute expiry (unix ms). A read past expiry evicts the
//! entry and reports it absent. Storage failures are logged and swallowed:
//! caching is best-effort and never fails a lookup.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default time-to-live for cached lookups
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at_ms: i64,
}

impl CacheEntry {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms
    }
}

/// Storage backend for cache entries
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> io::Result<Option<CacheEntry>>;
    fn write(&self, key: &str, entry: CacheEntry) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// Process-lifetime store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<FxHashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> io::Result<Option<CacheEntry>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, entry: CacheEntry) -> io::Result<()> {
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// JSON-object file acting as the client's local storage.
///
/// The whole file is read and rewritten per operation; it only ever holds a
/// handful of recent lookups.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> io::Result<BTreeMap<String, CacheEntry>> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => {
                serde_json::from_str(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    /// Entries for a rewrite; a file that no longer parses is started over
    fn load_for_update(&self) -> io::Result<BTreeMap<String, CacheEntry>> {
        match self.load() {
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!(path = %self.path.display(), error = %e, "cache_file_reset");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn save(&self, entries: &BTreeMap<String, CacheEntry>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(entries).map_err(io::Error::other)?;
        fs::write(&self.path, json)
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> io::Result<Option<CacheEntry>> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn write(&self, key: &str, entry: CacheEntry) -> io::Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.load_for_update()?;
        entries.insert(key.to_string(), entry);
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.load_for_update()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

/// Build a provider-prefixed, lower-cased cache key
pub fn cache_key(prefix: &str, lookup: &str) -> String {
    format!("{}:{}", prefix, lookup.trim().to_lowercase())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Best-effort expiring cache
pub struct TtlCache {
    store: Box<dyn KeyValueStore>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(store: impl KeyValueStore + 'static, ttl: Duration) -> Self {
        Self { store: Box::new(store), ttl }
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(MemoryStore::new(), ttl)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, now_ms())
    }

    pub fn set(&self, key: &str, value: Value) {
        self.set_at(key, value, now_ms());
    }

    /// Typed read; an entry that no longer deserializes is treated as absent
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key = %key, error = %e, "cache_entry_undecodable");
                None
            }
        }
    }

    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, json),
            Err(e) => warn!(key = %key, error = %e, "cache_entry_unencodable"),
        }
    }

    pub(crate) fn get_at(&self, key: &str, now_ms: i64) -> Option<Value> {
        let entry = match self.store.read(key) {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(key = %key, error = %e, "cache_read_failed");
                return None;
            }
        };

        if entry.is_expired(now_ms) {
            debug!(key = %key, "cache_entry_expired");
            if let Err(e) = self.store.remove(key) {
                warn!(key = %key, error = %e, "cache_evict_failed");
            }
            return None;
        }
        Some(entry.value)
    }

    pub(crate) fn set_at(&self, key: &str, value: Value, now_ms: i64) {
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let entry = CacheEntry { value, expires_at_ms: now_ms.saturating_add(ttl_ms) };
        if let Err(e) = self.store.write(key, entry) {
            warn!(key = %key, error = %e, "cache_write_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    /// Store that shares its map so tests can observe evictions
    #[derive(Clone, Default)]
    struct SharedStore(Arc<MemoryStore>);

    impl KeyValueStore for SharedStore {
        fn read(&self, key: &str) -> io::Result<Option<CacheEntry>> {
            self.0.read(key)
        }
        fn write(&self, key: &str, entry: CacheEntry) -> io::Result<()> {
            self.0.write(key, entry)
        }
        fn remove(&self, key: &str) -> io::Result<()> {
            self.0.remove(key)
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn read(&self, _key: &str) -> io::Result<Option<CacheEntry>> {
            Err(io::Error::other("quota exceeded"))
        }
        fn write(&self, _key: &str, _entry: CacheEntry) -> io::Result<()> {
            Err(io::Error::other("quota exceeded"))
        }
        fn remove(&self, _key: &str) -> io::Result<()> {
            Err(io::Error::other("quota exceeded"))
        }
    }

    #[test]
    fn test_round_trip_before_expiry() {
        let cache = TtlCache::in_memory(Duration::from_secs(60));
        let value = json!({ "lat": -33.86, "lon": 151.2, "label": "Sydney" });
        cache.set_at("geo:sydney", value.clone(), 1_000);
        assert_eq!(cache.get_at("geo:sydney", 1_000 + 59_999), Some(value));
    }

    #[test]
    fn test_expired_entry_is_evicted() {
        let store = SharedStore::default();
        let cache = TtlCache::new(store.clone(), Duration::from_secs(60));
        cache.set_at("abr:acme", json!("x"), 1_000);
        assert_eq!(store.0.len(), 1);

        assert_eq!(cache.get_at("abr:acme", 1_000 + 60_001), None);
        assert!(store.0.is_empty());
    }

    #[test]
    fn test_missing_key_is_absent() {
        let cache = TtlCache::in_memory(DEFAULT_TTL);
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn test_storage_failures_are_swallowed() {
        let cache = TtlCache::new(BrokenStore, DEFAULT_TTL);
        cache.set("k", json!(1));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_cache_key_lowercases() {
        assert_eq!(cache_key("abr", "  ACME Pty Ltd "), "abr:acme pty ltd");
    }

    #[test]
    fn test_file_store_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        TtlCache::new(FileStore::new(&path), DEFAULT_TTL).set("oc:acme", json!({ "name": "Acme" }));

        let reopened = TtlCache::new(FileStore::new(&path), DEFAULT_TTL);
        assert_eq!(reopened.get("oc:acme"), Some(json!({ "name": "Acme" })));
    }

    #[test]
    fn test_corrupt_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();

        let cache = TtlCache::new(FileStore::new(&path), DEFAULT_TTL);
        assert_eq!(cache.get("anything"), None);
    }

    #[test]
    fn test_corrupt_file_recovers_on_next_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();

        let cache = TtlCache::new(FileStore::new(&path), DEFAULT_TTL);
        cache.set("oc:acme", json!({ "name": "Acme" }));
        assert_eq!(cache.get("oc:acme"), Some(json!({ "name": "Acme" })));

        let reopened = TtlCache::new(FileStore::new(&path), DEFAULT_TTL);
        assert_eq!(reopened.get("oc:acme"), Some(json!({ "name": "Acme" })));
    }
}
