//! Request and Response models for the record API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{validate_key, EvictQuery, PerformRequest, RecordQuery, MAX_KEY_LENGTH};
pub use responses::{
    ActionResponse, ErrorResponse, EvictResponse, HealthResponse, RecordListResponse,
    StatsResponse,
};
