//! Configuration Module
//!
//! Handles loading proxy configuration from the command line and
//! environment variables.

use std::env;

use crate::cache::{MAX_OBJECT_SIZE, MAX_TOTAL_SIZE};

/// Default cap on the forwarded client header block, in bytes
pub const MAX_HEADER_SIZE: usize = 8_192;

/// Proxy configuration parameters.
///
/// The listening port comes from the command line; the limits can be
/// overridden via environment variables and otherwise take the defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the proxy accepts client connections on
    pub listen_port: u16,
    /// Budget for the sum of all cached payload sizes
    pub max_cache_size: usize,
    /// Largest response that will be cached
    pub max_object_size: usize,
    /// Cap on the forwarded client header block
    pub max_header_size: usize,
    /// Port for the admin HTTP API; disabled when None
    pub admin_port: Option<u16>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Total cache budget in bytes (default: 1049000)
    /// - `CACHE_MAX_OBJECT_SIZE` - Largest cacheable response (default: 102400)
    /// - `MAX_HEADER_SIZE` - Forwarded header block cap (default: 8192)
    /// - `ADMIN_PORT` - Admin API port (default: unset, API disabled)
    pub fn from_env(listen_port: u16) -> Self {
        Self {
            listen_port,
            max_cache_size: env_or("CACHE_MAX_SIZE", MAX_TOTAL_SIZE),
            max_object_size: env_or("CACHE_MAX_OBJECT_SIZE", MAX_OBJECT_SIZE),
            max_header_size: env_or("MAX_HEADER_SIZE", MAX_HEADER_SIZE),
            admin_port: env::var("ADMIN_PORT").ok().and_then(|v| v.parse().ok()),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            max_cache_size: MAX_TOTAL_SIZE,
            max_object_size: MAX_OBJECT_SIZE,
            max_header_size: MAX_HEADER_SIZE,
            admin_port: None,
        }
    }
}
