//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cache sweep: Evicts cached records whose keys are no longer live

mod sweeper;

pub use sweeper::{spawn_sweeper_task, sweep, LivenessSource, SweepReport};
