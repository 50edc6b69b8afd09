//! Cache Entry Module
//!
//! A cached record snapshot plus access metadata.

use chrono::{DateTime, Duration, Utc};

use crate::record::EntityRecord;

// == Cache Entry ==
/// One record held in memory by the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Last persisted snapshot of the record
    pub record: EntityRecord,
    /// When this snapshot was loaded or written
    pub cached_at: DateTime<Utc>,
    /// Last time a reader was served from this entry
    pub last_access: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    pub fn new(record: EntityRecord) -> Self {
        let now = Utc::now();
        Self {
            record,
            cached_at: now,
            last_access: now,
        }
    }

    // == Touch ==
    /// Marks the entry as read now.
    pub fn touch(&mut self) {
        self.last_access = Utc::now();
    }

    // == Idle Time ==
    /// Time since the entry was last read, never negative.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_access).max(Duration::zero())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new(EntityRecord::new("u1", Utc::now()));
        assert_eq!(entry.record.key, "u1");
        assert_eq!(entry.cached_at, entry.last_access);
    }

    #[test]
    fn test_idle_for() {
        let mut entry = CacheEntry::new(EntityRecord::new("u1", Utc::now()));
        entry.last_access = Utc::now() - Duration::minutes(5);

        let idle = entry.idle_for(Utc::now());
        assert!(idle >= Duration::minutes(5));

        entry.touch();
        assert!(entry.idle_for(Utc::now()) < Duration::minutes(1));
    }

    #[test]
    fn test_idle_for_clock_skew_is_zero() {
        let entry = CacheEntry::new(EntityRecord::new("u1", Utc::now()));
        let earlier = entry.last_access - Duration::seconds(10);
        assert_eq!(entry.idle_for(earlier), Duration::zero());
    }
}
