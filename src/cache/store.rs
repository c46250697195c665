//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU ordering under a
//! total-size budget.

use std::collections::HashMap;

use bytes::Bytes;

use crate::cache::{CacheEntry, CacheKey, LruTracker, MAX_OBJECT_SIZE, MAX_TOTAL_SIZE};
use crate::error::{CacheError, CacheResult};

// == Cache Store ==
/// Size-bounded response storage with LRU eviction.
///
/// Invariants held after every public method returns:
/// - `total_size` equals the sum of all entry sizes
/// - `total_size <= max_total_size`
/// - every entry is at most `max_object_size` bytes
/// - every entry appears exactly once in the LRU order
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<CacheKey, CacheEntry>,
    /// Recency order, head = most recently used
    lru: LruTracker<CacheKey>,
    /// Sum of payload sizes currently stored
    total_size: usize,
    /// Budget for `total_size`
    max_total_size: usize,
    /// Largest payload accepted by `insert`
    max_object_size: usize,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(MAX_TOTAL_SIZE, MAX_OBJECT_SIZE)
    }
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store with the given limits.
    ///
    /// # Arguments
    /// * `max_total_size` - Budget for the sum of all payload sizes
    /// * `max_object_size` - Largest single payload accepted
    pub fn new(max_total_size: usize, max_object_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            total_size: 0,
            max_total_size,
            max_object_size,
        }
    }

    // == Lookup ==
    /// Finds the entry stored under `key`.
    ///
    /// Does not change the recency order; callers promote separately.
    pub fn lookup(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Insert ==
    /// Stores `payload` under `key` as the most recently used entry.
    ///
    /// An existing entry for the same key is replaced. Entries are then
    /// evicted from the tail until the size budget holds again; if the new
    /// payload alone exceeds the budget it is evicted too.
    ///
    /// # Returns
    /// The number of entries evicted.
    ///
    /// # Errors
    /// `CacheError::ObjectTooLarge` when the payload exceeds `max_object_size`.
    pub fn insert(&mut self, key: CacheKey, payload: Bytes) -> CacheResult<usize> {
        let size = payload.len();
        if size > self.max_object_size {
            return Err(CacheError::ObjectTooLarge {
                size,
                limit: self.max_object_size,
            });
        }

        if let Some(previous) = self.entries.remove(&key) {
            self.total_size -= previous.size();
            self.lru.remove(&key);
        }

        self.lru.touch(&key);
        self.entries.insert(key.clone(), CacheEntry::new(key, payload));
        self.total_size += size;

        let evicted = self.evict_to_budget();

        assert!(
            self.total_size <= self.max_total_size,
            "cache size {} exceeds budget {} after insert",
            self.total_size,
            self.max_total_size
        );
        debug_assert_eq!(self.entries.len(), self.lru.len());

        Ok(evicted)
    }

    // == Promote ==
    /// Moves the entry for `key` to the head of the recency order.
    ///
    /// Returns false when the key is not stored (for example because it was
    /// evicted after a lookup).
    pub fn promote(&mut self, key: &CacheKey) -> bool {
        if !self.entries.contains_key(key) {
            return false;
        }
        self.lru.touch(key);
        true
    }

    // == Eviction ==
    /// Drops tail entries until `total_size` fits the budget.
    fn evict_to_budget(&mut self) -> usize {
        let mut evicted = 0;
        while self.total_size > self.max_total_size {
            let Some(victim) = self.lru.evict_oldest() else {
                unreachable!("cache over budget with empty recency order");
            };
            let Some(entry) = self.entries.remove(&victim) else {
                unreachable!("recency order holds key {victim} missing from storage");
            };
            self.total_size -= entry.size();
            evicted += 1;
        }
        evicted
    }

    // == Clear ==
    /// Removes every entry, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        self.total_size = 0;
        count
    }

    // == Accessors ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all stored payload sizes.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn max_total_size(&self) -> usize {
        self.max_total_size
    }

    pub fn max_object_size(&self) -> usize {
        self.max_object_size
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates entries from most to least recently used.
    pub fn iter_by_recency(&self) -> impl Iterator<Item = &CacheEntry> {
        self.lru.iter().filter_map(|key| self.entries.get(key))
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<CacheKey> {
        self.lru.iter().cloned().collect()
    }
}
