//! Effect Module
//!
//! Bounded attribute changes applied by a successful action.

use serde::{Deserialize, Serialize};

use crate::error::{RecordError, Result};
use crate::record::{AttributeBounds, EntityRecord, RecordSchema};

// == Secondary Effect ==
/// An attribute that moves by a fraction of the primary change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryEffect {
    pub attribute: String,
    /// Share of the primary attribute's applied delta, rounded down
    pub ratio: f64,
}

// == Attribute Change ==
/// Before and after values of one attribute touched by an effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeChange {
    pub attribute: String,
    pub before: i64,
    pub after: i64,
}

impl AttributeChange {
    /// The delta that actually landed after clamping.
    pub fn applied(&self) -> i64 {
        self.after - self.before
    }
}

// == Effect ==
/// Adds `delta` to one attribute and derives secondary changes from what
/// was actually applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub attribute: String,
    pub delta: i64,
    pub secondary: Vec<SecondaryEffect>,
}

impl Effect {
    pub fn new(attribute: impl Into<String>, delta: i64) -> Self {
        Self {
            attribute: attribute.into(),
            delta,
            secondary: Vec::new(),
        }
    }

    pub fn with_secondary(mut self, attribute: impl Into<String>, ratio: f64) -> Self {
        self.secondary.push(SecondaryEffect {
            attribute: attribute.into(),
            ratio,
        });
        self
    }

    // == Apply ==
    /// Applies the effect to `record`, clamping every value to its bounds.
    ///
    /// When the primary attribute hits a bound, secondaries scale with the
    /// smaller delta that was applied, not the one requested.
    pub fn apply(&self, record: &mut EntityRecord, schema: &RecordSchema) -> Result<Vec<AttributeChange>> {
        let primary = shift(record, schema, &self.attribute, self.delta)?;
        let applied = primary.applied();

        let mut changes = vec![primary];
        for secondary in &self.secondary {
            let delta = (secondary.ratio * applied as f64).floor() as i64;
            changes.push(shift(record, schema, &secondary.attribute, delta)?);
        }
        Ok(changes)
    }
}

/// Current value of a declared attribute, falling back to its initial value.
pub fn current_value(record: &EntityRecord, schema: &RecordSchema, attribute: &str) -> Result<i64> {
    let bounds = declared(schema, attribute)?;
    Ok(record
        .attribute(attribute)
        .unwrap_or_else(|| bounds.initial()))
}

fn shift(
    record: &mut EntityRecord,
    schema: &RecordSchema,
    attribute: &str,
    delta: i64,
) -> Result<AttributeChange> {
    let bounds = declared(schema, attribute)?;
    let before = current_value(record, schema, attribute)?;
    let after = bounds.clamp(before.saturating_add(delta));
    record.attributes.insert(attribute.to_string(), after);

    Ok(AttributeChange {
        attribute: attribute.to_string(),
        before,
        after,
    })
}

fn declared<'a>(schema: &'a RecordSchema, attribute: &str) -> Result<&'a AttributeBounds> {
    schema.bounds(attribute).ok_or_else(|| {
        RecordError::InvalidRequest(format!("attribute '{}' is not declared", attribute))
    })
}
