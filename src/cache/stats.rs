//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Live cache counters.
///
/// Counters are atomic so lookups can record hits and misses while holding
/// only the read side of the cache lock.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
    uncacheable: AtomicU64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Recorders ==
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insertion(&self) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `count` evictions to the counter.
    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Counts a response that was relayed but too large to cache.
    pub fn record_uncacheable(&self) {
        self.uncacheable.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Captures the counters together with the store's current occupancy.
    ///
    /// # Arguments
    /// * `total_entries` - Number of entries in the store
    /// * `total_size` - Sum of entry sizes in bytes
    pub fn snapshot(&self, total_entries: usize, total_size: usize) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            uncacheable: self.uncacheable.load(Ordering::Relaxed),
            total_entries,
            total_size,
        }
    }
}

// == Stats Snapshot ==
/// Point-in-time copy of the cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Requests served from the cache
    pub hits: u64,
    /// Requests that had to go to the origin
    pub misses: u64,
    /// Responses committed to the cache
    pub insertions: u64,
    /// Entries removed to stay within the size budget
    pub evictions: u64,
    /// Responses skipped because they exceeded the object size cap
    pub uncacheable: u64,
    /// Current number of entries
    pub total_entries: usize,
    /// Current sum of entry sizes in bytes
    pub total_size: usize,
}

impl StatsSnapshot {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
