//! Request DTOs for the record API
//!
//! Defines the structure of incoming query strings and request bodies.

use serde::Deserialize;

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Validates a record key taken from the path.
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}

/// Query string of `GET` and `PATCH /records/:key`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordQuery {
    /// Create the record when missing; the endpoint decides the default
    #[serde(default)]
    pub create: Option<bool>,
}

/// Query string of `DELETE /records/:key`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvictQuery {
    /// Only drop the cached copy, keep the stored record
    #[serde(default)]
    pub cache_only: bool,
}

/// Request body of `POST /records/:key/actions/:action`
#[derive(Debug, Clone, Deserialize)]
pub struct PerformRequest {
    /// Requested change to the action's attribute
    pub amount: i64,
}

impl PerformRequest {
    pub fn validate(&self) -> Option<String> {
        if self.amount <= 0 {
            return Some("Amount must be positive".to_string());
        }
        None
    }
}
