//! Gate Policy Module
//!
//! Parameters of a sliding-window gate.

use std::time::Duration;

use serde::Serialize;

// == Gate Policy ==
/// When an action is admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatePolicy {
    /// Attribute value at or above which the action is always denied
    pub ceiling: Option<i64>,
    /// Length of the sliding window
    #[serde(with = "millis")]
    pub window: Duration,
    /// Occurrences allowed inside one window; also the history length kept
    pub window_limit: usize,
}

impl GatePolicy {
    // == Constructor ==
    pub fn new(window: Duration, window_limit: usize) -> Self {
        Self {
            ceiling: None,
            window,
            window_limit,
        }
    }

    pub fn with_ceiling(mut self, ceiling: i64) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(window: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(window.as_millis() as u64)
    }
}
