//! Record Schema Module
//!
//! Declared attributes, their bounds and default values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RecordError, Result};
use crate::record::EntityRecord;

// == Attribute Bounds ==
/// Inclusive value range of one attribute plus the value new records start at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeBounds {
    pub low: i64,
    pub high: i64,
    /// Starting value; `low` when omitted
    #[serde(default)]
    pub default: Option<i64>,
}

impl AttributeBounds {
    pub fn new(low: i64, high: i64) -> Self {
        Self {
            low,
            high,
            default: None,
        }
    }

    pub fn with_default(mut self, default: i64) -> Self {
        self.default = Some(default);
        self
    }

    // == Clamp ==
    /// Pulls a value into `[low, high]`.
    pub fn clamp(&self, value: i64) -> i64 {
        value.max(self.low).min(self.high)
    }

    /// Value a freshly created record starts at.
    pub fn initial(&self) -> i64 {
        self.clamp(self.default.unwrap_or(self.low))
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.low > self.high {
            return Err(RecordError::InvalidPolicy(format!(
                "attribute '{}' has low bound {} above high bound {}",
                name, self.low, self.high
            )));
        }
        if let Some(default) = self.default {
            if default < self.low || default > self.high {
                return Err(RecordError::InvalidPolicy(format!(
                    "attribute '{}' default {} is outside [{}, {}]",
                    name, default, self.low, self.high
                )));
            }
        }
        Ok(())
    }
}

// == Record Schema ==
/// The set of attributes every record carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSchema {
    attributes: BTreeMap<String, AttributeBounds>,
}

impl RecordSchema {
    pub fn new(attributes: BTreeMap<String, AttributeBounds>) -> Self {
        Self { attributes }
    }

    /// Adds or replaces one attribute declaration.
    pub fn with_attribute(mut self, name: impl Into<String>, bounds: AttributeBounds) -> Self {
        self.attributes.insert(name.into(), bounds);
        self
    }

    pub fn bounds(&self, name: &str) -> Option<&AttributeBounds> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&String, &AttributeBounds)> {
        self.attributes.iter()
    }

    /// Checks every declaration. Called once at configuration load.
    pub fn validate(&self) -> Result<()> {
        for (name, bounds) in &self.attributes {
            bounds.validate(name)?;
        }
        Ok(())
    }

    // == Default Record ==
    /// Builds the record a key starts with: every declared attribute at its
    /// initial value, no history, no counters.
    pub fn default_record(&self, key: &str, now: DateTime<Utc>) -> EntityRecord {
        let mut record = EntityRecord::new(key, now);
        for (name, bounds) in &self.attributes {
            record.attributes.insert(name.clone(), bounds.initial());
        }
        record
    }

    // == Conform ==
    /// Clamps every declared attribute already present on `record` into its
    /// bounds. Returns whether anything moved.
    ///
    /// Stored records may predate the current bounds.
    pub fn conform(&self, record: &mut EntityRecord) -> bool {
        let mut changed = false;
        for (name, bounds) in &self.attributes {
            if let Some(value) = record.attributes.get_mut(name) {
                let clamped = bounds.clamp(*value);
                if clamped != *value {
                    *value = clamped;
                    changed = true;
                }
            }
        }
        changed
    }
}
