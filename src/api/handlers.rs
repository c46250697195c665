//! API Handlers
//!
//! HTTP request handlers for the admin endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::info;

use crate::cache::SharedCache;
use crate::models::{EntriesResponse, HealthResponse, PurgeResponse, StatsResponse};

/// Application state shared across all handlers.
///
/// Holds the same cache instance the proxy workers use.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<SharedCache>,
}

impl AppState {
    /// Creates a new AppState around a shared cache.
    pub fn new(cache: Arc<SharedCache>) -> Self {
        Self { cache }
    }
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.cache.stats().await))
}

/// Handler for GET /entries
///
/// Lists cached objects, most recently used first.
pub async fn entries_handler(State(state): State<AppState>) -> Json<EntriesResponse> {
    Json(EntriesResponse::new(state.cache.entries().await))
}

/// Handler for DELETE /entries
///
/// Drops every cached object.
pub async fn purge_handler(State(state): State<AppState>) -> Json<PurgeResponse> {
    let removed = state.cache.clear().await;
    info!(removed, "Cache purged via admin API");
    Json(PurgeResponse::new(removed))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
