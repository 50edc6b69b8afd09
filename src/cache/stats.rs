//! Cache Statistics Module
//!
//! Tracks cache metrics including hits, misses, evictions and store traffic.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Reads served from memory
    pub hits: u64,
    /// Reads that had to go to the store
    pub misses: u64,
    /// Entries dropped from memory (sweeps and explicit evictions)
    pub evictions: u64,
    /// Successful write-through persists
    pub writes: u64,
    /// Store calls that failed or timed out
    pub store_failures: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_store_failure(&mut self) {
        self.store_failures += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
