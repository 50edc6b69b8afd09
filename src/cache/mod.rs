//! Cache Module
//!
//! Provides the write-through record cache and its bookkeeping.

mod entry;
mod locks;
mod records;
mod stats;


// Re-export public types
pub use entry::CacheEntry;
pub use locks::{KeyGuard, KeyLocks};
pub use records::{CacheOptions, EvictOutcome, Mutation, RecordCache};
pub use stats::CacheStats;
