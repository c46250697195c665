//! Cache Key Module
//!
//! Identity of a cached response, derived from the request's host and path.

use std::fmt;

// == Cache Key ==
/// Identifies a cached origin response.
///
/// `host` is the request authority: the bare host name for the default
/// port, `host:port` otherwise, so two origins on one machine never share
/// an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    host: String,
    path: String,
}

impl CacheKey {
    // == Constructor ==
    /// Creates a key from an authority and a path.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
        }
    }

    /// Returns the authority component.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the path component.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.host, self.path)
    }
}
