//! Rate Gate Module
//!
//! Sliding-window admission over a bounded timestamp history.
//!
//! An action is denied when the governed attribute has reached its ceiling,
//! or when each of the last `window_limit` occurrences happened inside the
//! window. Only the last `window_limit` timestamps are ever consulted, which
//! is why histories are trimmed to that length on write.

mod policy;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::record::BoundedHistory;

pub use policy::GatePolicy;

// == Decision ==
/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// `remaining` occurrences would be admitted right now, this one included
    Allowed { remaining: usize },
    Denied { reason: DenyReason },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    /// Admissible occurrences right now; zero when denied.
    pub fn remaining(&self) -> usize {
        match self {
            Decision::Allowed { remaining } => *remaining,
            Decision::Denied { .. } => 0,
        }
    }
}

// == Deny Reason ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    /// The attribute already sits at or above the policy ceiling
    AtCapacity { value: i64, ceiling: i64 },
    /// Every one of the last `limit` occurrences is inside the window
    WindowFull {
        limit: usize,
        /// When the oldest counted occurrence leaves the window; absent when
        /// nothing ever leaves (zero limit)
        retry_at: Option<DateTime<Utc>>,
    },
}

// == Rate Gate ==
/// Applies one [`GatePolicy`] to attribute values and histories.
#[derive(Debug, Clone)]
pub struct RateGate {
    policy: GatePolicy,
}

impl RateGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    // == Check ==
    /// Decides whether one more occurrence is admitted at `now`.
    ///
    /// `value` is the governed attribute's current value and `history` the
    /// action's past timestamps (absent for an action never performed).
    pub fn check(
        &self,
        value: i64,
        history: Option<&BoundedHistory>,
        now: DateTime<Utc>,
    ) -> Decision {
        if let Some(ceiling) = self.policy.ceiling {
            if value >= ceiling {
                return Decision::Denied {
                    reason: DenyReason::AtCapacity { value, ceiling },
                };
            }
        }

        let limit = self.policy.window_limit;
        let recent: Vec<DateTime<Utc>> = history
            .map(|h| h.latest(limit).copied().collect())
            .unwrap_or_default();

        let cutoff = self.cutoff(now);
        let in_window: Vec<&DateTime<Utc>> = recent
            .iter()
            .filter(|at| cutoff.map_or(true, |cutoff| **at > cutoff))
            .collect();

        if recent.len() == limit && in_window.len() == limit {
            let retry_at = in_window
                .first()
                .and_then(|oldest| oldest.checked_add_signed(self.window_delta()?));
            return Decision::Denied {
                reason: DenyReason::WindowFull { limit, retry_at },
            };
        }

        Decision::Allowed {
            remaining: limit - in_window.len(),
        }
    }

    /// Earliest instant still inside the window; `None` when the window
    /// reaches back past the start of representable time.
    fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_signed(self.window_delta()?)
    }

    fn window_delta(&self) -> Option<TimeDelta> {
        TimeDelta::from_std(self.policy.window).ok()
    }
}
