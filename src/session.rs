//! Session Tracker Module
//!
//! Liveness by recent activity: a key is live while it has been seen within
//! the session TTL.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::tasks::LivenessSource;

// == Session Tracker ==
#[derive(Debug)]
pub struct SessionTracker {
    seen: RwLock<HashMap<String, DateTime<Utc>>>,
    ttl: TimeDelta,
}

impl SessionTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: RwLock::new(HashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    // == Touch ==
    /// Records activity for `key` now.
    pub fn touch(&self, key: &str) {
        self.touch_at(key, Utc::now());
    }

    pub fn touch_at(&self, key: &str, at: DateTime<Utc>) {
        let mut seen = self.seen.write().unwrap_or_else(PoisonError::into_inner);
        seen.insert(key.to_string(), at);
    }

    /// Forgets `key`; it stops being live immediately.
    pub fn end(&self, key: &str) {
        let mut seen = self.seen.write().unwrap_or_else(PoisonError::into_inner);
        seen.remove(key);
    }

    pub fn is_live_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        let seen = self.seen.read().unwrap_or_else(PoisonError::into_inner);
        seen.get(key)
            .is_some_and(|last| now.signed_duration_since(*last) < self.ttl)
    }

    // == Prune ==
    /// Drops sessions that expired before `now`. Returns how many.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut seen = self.seen.write().unwrap_or_else(PoisonError::into_inner);
        let before = seen.len();
        seen.retain(|_, last| now.signed_duration_since(*last) < self.ttl);
        before - seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LivenessSource for SessionTracker {
    fn is_live(&self, key: &str) -> bool {
        self.is_live_at(key, Utc::now())
    }

    fn sweep_finished(&self) {
        let pruned = self.prune(Utc::now());
        if pruned > 0 {
            debug!("Pruned {} expired sessions", pruned);
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touched_key_is_live() {
        let sessions = SessionTracker::new(Duration::from_secs(60));
        sessions.touch("u1");
        assert!(sessions.is_live("u1"));
        assert!(!sessions.is_live("u2"));
    }

    #[test]
    fn test_session_expires_after_ttl() {
        let sessions = SessionTracker::new(Duration::from_secs(60));
        let start = Utc::now();
        sessions.touch_at("u1", start);

        assert!(sessions.is_live_at("u1", start + TimeDelta::seconds(59)));
        assert!(!sessions.is_live_at("u1", start + TimeDelta::seconds(60)));
    }

    #[test]
    fn test_end_session() {
        let sessions = SessionTracker::new(Duration::from_secs(60));
        sessions.touch("u1");
        sessions.end("u1");
        assert!(!sessions.is_live("u1"));
    }

    #[test]
    fn test_prune_removes_only_expired() {
        let sessions = SessionTracker::new(Duration::from_secs(60));
        let now = Utc::now();
        sessions.touch_at("old", now - TimeDelta::minutes(5));
        sessions.touch_at("new", now);

        assert_eq!(sessions.prune(now), 1);
        assert_eq!(sessions.len(), 1);
        assert!(sessions.is_live_at("new", now));
    }
}
