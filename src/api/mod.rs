//! Admin API Module
//!
//! Optional HTTP interface for inspecting and purging the proxy cache.
//!
//! # Endpoints
//! - `GET /stats` - Cache statistics
//! - `GET /entries` - List cached objects
//! - `DELETE /entries` - Purge the cache
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::{create_router, serve_admin};
