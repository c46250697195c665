//! Cache Entry Module
//!
//! Defines the structure for a single cached origin response.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::cache::CacheKey;

// == Cache Entry ==
/// Represents one cached response with its key and metadata.
///
/// The payload is immutable once stored; cloning it only bumps a reference
/// count, so readers can take a copy out of the lock scope cheaply.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Request identity this response was fetched for
    pub key: CacheKey,
    /// Exact bytes received from the origin
    pub payload: Bytes,
    /// Creation timestamp (Unix milliseconds), reported as an age by `/entries`
    pub created_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current time.
    ///
    /// # Arguments
    /// * `key` - The request identity
    /// * `payload` - The origin response bytes
    pub fn new(key: CacheKey, payload: Bytes) -> Self {
        Self {
            key,
            payload,
            created_at: current_timestamp_ms(),
        }
    }

    // == Size ==
    /// Returns the payload length in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    // == Age ==
    /// Returns how long ago the entry was stored, in milliseconds.
    pub fn age_ms(&self) -> u64 {
        current_timestamp_ms().saturating_sub(self.created_at)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as zero.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
