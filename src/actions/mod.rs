//! Actions Module
//!
//! Gated actions: their definitions, effects, and the processor that runs
//! them against cached records.

mod effect;
mod processor;
mod registry;

pub use effect::{current_value, AttributeChange, Effect, SecondaryEffect};
pub use processor::{ActionProcessor, Outcome};
pub use registry::{default_actions, ActionDefinition, ActionRegistry};
