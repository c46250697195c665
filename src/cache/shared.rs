//! Shared Cache Service
//!
//! The process-wide cache: a `CacheStore` behind a reader-preference lock,
//! plus statistics. Constructed once at startup and handed to every
//! connection task behind an `Arc`.

use bytes::Bytes;
use tracing::debug;

use crate::cache::{CacheEntry, CacheKey, CacheStats, CacheStore, StatsSnapshot};
use crate::config::Config;
use crate::error::CacheResult;
use crate::sync::ReaderPreferenceLock;

// == Shared Cache ==
/// Synchronized cache service used by the proxy workers.
#[derive(Debug)]
pub struct SharedCache {
    /// Entries and recency order
    store: ReaderPreferenceLock<CacheStore>,
    /// Counters, updated without taking the write role
    stats: CacheStats,
    /// Copied from the store so the relay can read it without locking
    max_object_size: usize,
}

impl Default for SharedCache {
    fn default() -> Self {
        Self::new(CacheStore::default())
    }
}

impl SharedCache {
    // == Constructors ==
    /// Wraps an existing store.
    pub fn new(store: CacheStore) -> Self {
        Self {
            max_object_size: store.max_object_size(),
            store: ReaderPreferenceLock::new(store),
            stats: CacheStats::new(),
        }
    }

    /// Creates an empty cache sized from the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(CacheStore::new(config.max_cache_size, config.max_object_size))
    }

    // == Lookup ==
    /// Returns a copy of the payload stored under `key`.
    ///
    /// Runs under the read role and leaves the recency order alone. The
    /// returned bytes stay valid even if the entry is evicted afterwards.
    pub async fn lookup(&self, key: &CacheKey) -> Option<Bytes> {
        let store = self.store.acquire_read().await;
        match store.lookup(key) {
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.payload.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Promote ==
    /// Marks `key` as most recently used under the write role.
    ///
    /// Returns false if the entry disappeared since it was looked up.
    pub async fn promote(&self, key: &CacheKey) -> bool {
        let mut store = self.store.acquire_write().await;
        let promoted = store.promote(key);
        if !promoted {
            debug!(%key, "Entry evicted before promotion");
        }
        promoted
    }

    // == Insert ==
    /// Commits a fetched response under the write role.
    ///
    /// # Returns
    /// The number of entries evicted to make room.
    pub async fn insert(&self, key: CacheKey, payload: Bytes) -> CacheResult<usize> {
        let size = payload.len();
        let mut store = self.store.acquire_write().await;

        match store.insert(key.clone(), payload) {
            Ok(evicted) => {
                // A payload larger than the whole budget evicts itself.
                if store.contains(&key) {
                    self.stats.record_insertion();
                }
                self.stats.record_evictions(evicted);
                debug!(
                    %key,
                    bytes = size,
                    evicted,
                    total_size = store.total_size(),
                    "Cached response"
                );
                Ok(evicted)
            }
            Err(e) => {
                self.stats.record_uncacheable();
                Err(e)
            }
        }
    }

    /// Counts a response the relay declined to buffer.
    pub fn record_uncacheable(&self) {
        self.stats.record_uncacheable();
    }

    // == Introspection ==
    /// Current statistics with occupancy read under the read role.
    pub async fn stats(&self) -> StatsSnapshot {
        let store = self.store.acquire_read().await;
        self.stats.snapshot(store.len(), store.total_size())
    }

    /// Largest payload the store accepts, in bytes.
    pub fn max_object_size(&self) -> usize {
        self.max_object_size
    }

    /// Snapshot of the entries from most to least recently used.
    ///
    /// Payloads are shared, not copied.
    pub async fn entries(&self) -> Vec<CacheEntry> {
        let store = self.store.acquire_read().await;
        store.iter_by_recency().cloned().collect()
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.store.acquire_read().await.contains(key)
    }

    // == Clear ==
    /// Drops every entry, returning how many were removed.
    pub async fn clear(&self) -> usize {
        self.store.acquire_write().await.clear()
    }
}
