//! Error types for the caching proxy
//!
//! Provides unified error handling using thiserror.

use std::io;

use thiserror::Error;

// == Cache Error Enum ==
/// Rejections raised by the cache store.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CacheError {
    /// Payload is larger than the per-object cap
    #[error("Object of {size} bytes exceeds maximum object size of {limit} bytes")]
    ObjectTooLarge { size: usize, limit: usize },
}

// == Proxy Error Enum ==
/// Failures confined to a single client connection.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Request line or target could not be parsed, or is not an absolute-URI GET
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Client closed the connection before sending a request line
    #[error("Client closed connection before sending a request")]
    EmptyRequest,

    /// Origin server could not be reached
    #[error("Origin {authority} unreachable: {source}")]
    OriginUnreachable {
        authority: String,
        #[source]
        source: io::Error,
    },

    /// Reading from or writing to the client failed
    #[error("Client I/O error: {0}")]
    ClientIo(#[source] io::Error),

    /// Reading from or writing to the origin failed mid-relay
    #[error("Origin I/O error: {0}")]
    OriginIo(#[source] io::Error),
}

impl ProxyError {
    /// Shorthand for a malformed-request error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        ProxyError::MalformedRequest(reason.into())
    }
}

// == Result Type Aliases ==
/// Convenience Result type for cache store operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Convenience Result type for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
