//! Caching Proxy - A forwarding HTTP proxy with an in-memory object cache
//!
//! Relays absolute-URI GET requests to origin servers and keeps small
//! responses in an LRU cache bounded by total size.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod sync;

pub use api::AppState;
pub use cache::SharedCache;
pub use config::Config;
pub use proxy::ProxyServer;
