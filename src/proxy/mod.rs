//! Proxy Module
//!
//! The request pipeline: parse the client request, consult the cache, relay
//! from the origin on a miss.
//!
//! # Flow
//! `ProxyServer::run` → `handle_connection` → `read_request` →
//! `SharedCache::lookup` → (hit: write payload, promote) or
//! (miss: `relay::fetch`, `SharedCache::insert`)

pub mod relay;
pub mod request;
pub mod server;

pub use request::{ProxyRequest, RequestTarget};
pub use server::{handle_connection, ConnectionOutcome, ConnectionSettings, ProxyServer};
