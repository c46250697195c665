//! Synchronization Module
//!
//! Locking primitives shared by the proxy's worker tasks.

mod reader_preference;

pub use reader_preference::{ReadGuard, ReaderPreferenceLock, WriteGuard};
