//! API Routes
//!
//! Configures the Axum router for the admin endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{entries_handler, health_handler, purge_handler, stats_handler, AppState};
use crate::cache::SharedCache;

/// Creates the admin router.
///
/// # Endpoints
/// - `GET /stats` - Cache statistics
/// - `GET /entries` - Cached objects, most recently used first
/// - `DELETE /entries` - Purge the cache
/// - `GET /health` - Health check
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/stats", get(stats_handler))
        .route("/entries", get(entries_handler).delete(purge_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the admin API on `port` until the process exits.
pub async fn serve_admin(port: u16, cache: Arc<SharedCache>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Admin API listening on http://{}", addr);

    axum::serve(listener, create_router(AppState::new(cache))).await
}
