//! Cache Module
//!
//! Provides the in-memory object cache with LRU eviction under a total-size
//! budget.

mod entry;
mod key;
mod lru;
mod shared;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use lru::LruTracker;
pub use shared::SharedCache;
pub use stats::{CacheStats, StatsSnapshot};
pub use store::CacheStore;

// == Public Constants ==
/// Default budget for the sum of all cached payload sizes, in bytes
pub const MAX_TOTAL_SIZE: usize = 1_049_000;

/// Default largest single response that will be cached, in bytes
pub const MAX_OBJECT_SIZE: usize = 102_400;
