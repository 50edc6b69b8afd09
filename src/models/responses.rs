//! Response DTOs for the record API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::actions::Outcome;
use crate::cache::CacheStats;
use crate::record::EntityRecord;

/// Response body of `GET /records`
#[derive(Debug, Clone, Serialize)]
pub struct RecordListResponse {
    pub count: usize,
    pub records: Vec<EntityRecord>,
}

impl RecordListResponse {
    pub fn new(records: Vec<EntityRecord>) -> Self {
        Self {
            count: records.len(),
            records,
        }
    }
}

/// Response body of `DELETE /records/:key`
#[derive(Debug, Clone, Serialize)]
pub struct EvictResponse {
    /// Success message
    pub message: String,
    /// The key that was evicted
    pub key: String,
    /// Whether anything was removed
    pub removed: bool,
    /// Whether the stored record was left in place
    pub cache_only: bool,
}

impl EvictResponse {
    pub fn new(key: impl Into<String>, removed: bool, cache_only: bool) -> Self {
        let key = key.into();
        let scope = if cache_only { "cache" } else { "cache and store" };
        Self {
            message: format!("Key '{}' evicted from {}", key, scope),
            key,
            removed,
            cache_only,
        }
    }
}

/// Response body of `POST /records/:key/actions/:action`
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    pub key: String,
    pub action: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Whether an immediate repeat would be admitted
    pub can_repeat: bool,
}

impl ActionResponse {
    pub fn new(key: impl Into<String>, action: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            key: key.into(),
            action: action.into(),
            can_repeat: outcome.can_repeat(),
            outcome,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub cache: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Keys currently considered live
    pub live_sessions: usize,
}

impl StatsResponse {
    pub fn new(cache: CacheStats, live_sessions: usize) -> Self {
        Self {
            hit_rate: cache.hit_rate(),
            cache,
            live_sessions,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
