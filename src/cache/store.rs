//! Key/value stores behind the read-through cache

use super::entry::{CacheEntry, Freshness};
use crate::error::CacheError;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Last-writer-wins map of cache entries
pub trait CacheStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Insert or overwrite an entry
    fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    fn clear(&self) -> Result<(), CacheError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries past their stale window, returning how many went
    fn prune(&self) -> Result<usize, CacheError>;
}

fn prune_map(entries: &mut HashMap<String, CacheEntry>) -> usize {
    let now = Utc::now();
    let before = entries.len();
    entries.retain(|_, entry| entry.freshness_at(now) != Freshness::Expired);
    before - entries.len()
}

/// Process-local store for server-side calls
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.write().insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn prune(&self) -> Result<usize, CacheError> {
        Ok(prune_map(&mut self.entries.write()))
    }
}

/// JSON file persisted across runs, for client-side calls.
///
/// The whole map is held in memory and rewritten on every change, with
/// blocking file I/O on the calling thread. Meant for small caches written
/// at a low rate, such as one CLI invocation's responses. Reads never wait
/// on the disk; writers queue behind `write_lock` so the file always holds
/// the newest snapshot.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, CacheEntry>>,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| CacheError::ReadError(format!("{}: {}", path.display(), e)))?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| CacheError::Corrupted {
                    key: path.display().to_string(),
                    reason: e.to_string(),
                })?
            }
        } else {
            HashMap::new()
        };

        tracing::debug!("Opened cache {} ({} entries)", path.display(), entries.len());
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            write_lock: Mutex::new(()),
        })
    }

    /// Open the store, starting empty when the file cannot be read
    pub fn open_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache: {}", e);
                Self {
                    path,
                    entries: RwLock::new(HashMap::new()),
                    write_lock: Mutex::new(()),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to the map and persist the result when it reports one.
    /// The map lock is released before touching the disk.
    fn update<R>(
        &self,
        change: impl FnOnce(&mut HashMap<String, CacheEntry>) -> (R, bool),
    ) -> Result<R, CacheError> {
        let _write = self.write_lock.lock();
        let (result, content) = {
            let mut entries = self.entries.write();
            let (result, changed) = change(&mut *entries);
            let content = if changed {
                Some(
                    serde_json::to_string(&*entries)
                        .map_err(|e| CacheError::WriteError(e.to_string()))?,
                )
            } else {
                None
            };
            (result, content)
        };
        if let Some(content) = content {
            self.persist(&content)?;
        }
        Ok(result)
    }

    /// Write via a temp file and rename, so readers never see a partial file
    fn persist(&self, content: &str) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::WriteError(format!("{}: {}", parent.display(), e)))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .map_err(|e| CacheError::WriteError(format!("{}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| CacheError::WriteError(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        self.update(|entries| {
            entries.insert(key.to_string(), entry);
            ((), true)
        })
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.update(|entries| ((), entries.remove(key).is_some()))
    }

    fn clear(&self) -> Result<(), CacheError> {
        let _write = self.write_lock.lock();
        self.entries.write().clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|e| CacheError::WriteError(format!("{}: {}", self.path.display(), e)))?;
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn prune(&self) -> Result<usize, CacheError> {
        self.update(|entries| {
            let removed = prune_map(entries);
            (removed, removed > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlPolicy;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(value: serde_json::Value) -> CacheEntry {
        CacheEntry::new(value, TtlPolicy::network_params())
    }

    fn aged(value: serde_json::Value, secs: i64) -> CacheEntry {
        CacheEntry::fetched_at(
            value,
            TtlPolicy::network_params(),
            Utc::now() - chrono::Duration::seconds(secs),
        )
    }

    #[test]
    fn test_memory_store_last_writer_wins() {
        let store = MemoryStore::new();
        store.put("params", entry(json!(1))).unwrap();
        store.put("params", entry(json!(2))).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("params").unwrap().value, json!(2));

        store.remove("params").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let store = FileStore::open(&path).unwrap();
        store.put("holders:ujuno", entry(json!({"count": 1204}))).unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("holders:ujuno").unwrap().value,
            json!({"count": 1204})
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let store = FileStore::open(&path).unwrap();
        store.put("a", entry(json!(1))).unwrap();
        assert!(path.exists());

        store.clear().unwrap();
        assert!(!path.exists());
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupted_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(CacheError::Corrupted { .. })
        ));
        assert!(FileStore::open_or_empty(&path).is_empty());
    }

    #[test]
    fn test_file_store_concurrent_writers_keep_every_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let store = std::sync::Arc::new(FileStore::open(&path).unwrap());

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.put(&format!("denom-{}", i), entry(json!(i))).unwrap();
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 8);
        assert_eq!(reopened.get("denom-5").unwrap().value, json!(5));
    }

    #[test]
    fn test_prune_drops_expired_only() {
        let store = MemoryStore::new();
        store.put("fresh", aged(json!(1), 10)).unwrap();
        store.put("stale", aged(json!(2), 400)).unwrap();
        store.put("expired", aged(json!(3), 900)).unwrap();

        assert_eq!(store.prune().unwrap(), 1);
        assert!(store.get("expired").is_none());
        assert!(store.get("stale").is_some());
    }
}
