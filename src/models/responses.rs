//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheEntry, StatsSnapshot};

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Raw counters and occupancy
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from a statistics snapshot
    pub fn new(stats: StatsSnapshot) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

/// One cached object in the entries listing
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub host: String,
    pub path: String,
    /// Payload size in bytes
    pub size: usize,
    /// Milliseconds since the response was cached
    pub age_ms: u64,
}

/// Response body for GET /entries, most recently used first
#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    pub count: usize,
    pub total_size: usize,
    pub entries: Vec<EntrySummary>,
}

impl EntriesResponse {
    pub fn new(entries: Vec<CacheEntry>) -> Self {
        let entries: Vec<EntrySummary> = entries
            .iter()
            .map(|entry| EntrySummary {
                host: entry.key.host().to_string(),
                path: entry.key.path().to_string(),
                size: entry.size(),
                age_ms: entry.age_ms(),
            })
            .collect();
        Self {
            count: entries.len(),
            total_size: entries.iter().map(|e| e.size).sum(),
            entries,
        }
    }
}

/// Response body for DELETE /entries
#[derive(Debug, Clone, Serialize)]
pub struct PurgeResponse {
    pub message: String,
    pub removed: usize,
}

impl PurgeResponse {
    pub fn new(removed: usize) -> Self {
        Self {
            message: format!("Purged {} cached objects", removed),
            removed,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
