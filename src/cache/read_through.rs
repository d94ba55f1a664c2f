//! Read-through cache with stale-while-revalidate

use super::entry::{CacheEntry, Freshness, TtlPolicy};
use super::store::{CacheStore, MemoryStore};
use crate::error::FetchError;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Wraps fetches with a keyed cache.
///
/// Fresh entries are served without fetching. Stale entries are served
/// immediately while one background refresh per key runs. Expired or missing
/// entries are fetched synchronously. Refreshes run on the tokio runtime;
/// short-lived processes call [`ReadThroughCache::settle`] before exiting so
/// the refreshed values reach the store.
#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<dyn CacheStore>,
    refreshing: Arc<Mutex<HashSet<String>>>,
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl ReadThroughCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            refreshing: Arc::new(Mutex::new(HashSet::new())),
            tasks: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Cache over a fresh in-memory store
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Whether a background refresh for `key` is running
    pub fn is_refreshing(&self, key: &str) -> bool {
        self.refreshing.lock().contains(key)
    }

    /// Serve `key` from the cache, fetching through `fetch` as needed.
    ///
    /// A failed synchronous fetch propagates and stores nothing. A failed
    /// background refresh is logged and the stale entry stays.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        policy: TtlPolicy,
        fetch: F,
    ) -> Result<T, FetchError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        if let Some(entry) = self.store.get(key) {
            let freshness = entry.freshness();
            if freshness != Freshness::Expired {
                match serde_json::from_value::<T>(entry.value) {
                    Ok(value) => {
                        if freshness == Freshness::Stale {
                            self.spawn_refresh(key, policy, fetch);
                        } else {
                            tracing::debug!("Cache hit for {}", key);
                        }
                        return Ok(value);
                    }
                    Err(e) => {
                        tracing::debug!("Cached {} does not decode, refetching: {}", key, e);
                    }
                }
            } else {
                tracing::debug!("Cache entry for {} expired", key);
            }
        }

        let value = fetch().await?;
        self.store_value(key, policy, &value);
        Ok(value)
    }

    /// Wait for every background refresh started so far
    pub async fn settle(&self) {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Background refresh task failed: {}", e);
            }
        }
    }

    /// Drop one key
    pub fn invalidate(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::warn!("Failed to invalidate {}: {}", key, e);
        }
    }

    fn spawn_refresh<T, F, Fut>(&self, key: &str, policy: TtlPolicy, fetch: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        if !self.refreshing.lock().insert(key.to_string()) {
            tracing::debug!("Refresh for {} already in flight", key);
            return;
        }

        tracing::debug!("Serving stale {}, refreshing in background", key);
        let cache = self.clone();
        let key = key.to_string();
        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            match fetch().await {
                Ok(value) => cache.store_value(&key, policy, &value),
                Err(e) => tracing::warn!("Background refresh of {} failed: {}", key, e),
            }
            cache.refreshing.lock().remove(&key);
        });
    }

    fn store_value<T: Serialize>(&self, key: &str, policy: TtlPolicy, value: &T) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Not caching {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.put(key, CacheEntry::new(json, policy)) {
            tracing::warn!("Failed to cache {}: {}", key, e);
        }
    }
}
