//! Response models for the admin API
//!
//! DTOs serialized into the admin endpoints' JSON bodies.

pub mod responses;

pub use responses::{EntriesResponse, EntrySummary, HealthResponse, PurgeResponse, StatsResponse};
