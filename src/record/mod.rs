//! Record Module
//!
//! Entity records, their schema and bounded action histories.

mod entity;
mod history;
mod schema;

pub use entity::{EntityRecord, RecordPatch};
pub use history::BoundedHistory;
pub use schema::{AttributeBounds, RecordSchema};

/// History length used when no action policy says otherwise
pub const DEFAULT_HISTORY_CAPACITY: usize = 3;
