//! Statecache - a write-through cache of per-entity records
//!
//! Keeps hot records in memory in front of a durable store, gates repeated
//! actions with a sliding window, and sweeps entries for keys that went idle.

pub mod actions;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod gate;
pub mod models;
pub mod record;
pub mod session;
pub mod store;
pub mod tasks;

pub use actions::{ActionProcessor, ActionRegistry, Outcome};
pub use api::{create_router, AppState};
pub use cache::{CacheOptions, RecordCache};
pub use config::Config;
pub use error::{RecordError, Result};
pub use gate::{Decision, DenyReason, GatePolicy, RateGate};
pub use record::{EntityRecord, RecordPatch, RecordSchema};
pub use session::SessionTracker;
pub use store::{FileStore, MemoryStore, RecordStore};
pub use tasks::{spawn_sweeper_task, sweep, LivenessSource, SweepReport};
