//! Entity Record Module
//!
//! The persisted per-entity state and partial updates to it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RecordError, Result};
use crate::record::{BoundedHistory, RecordSchema, DEFAULT_HISTORY_CAPACITY};

// == Entity Record ==
/// Game state of one tracked entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Unique key, fixed at creation
    pub key: String,
    /// Bounded numeric stats by name
    #[serde(default)]
    pub attributes: BTreeMap<String, i64>,
    /// Recent timestamps per action name
    #[serde(default)]
    pub action_history: BTreeMap<String, BoundedHistory>,
    /// Successful invocations per action name
    #[serde(default)]
    pub counters: BTreeMap<String, u64>,
    pub created_at: DateTime<Utc>,
    /// Bumped on every persisted change
    #[serde(default)]
    pub revision: u64,
}

impl EntityRecord {
    // == Constructor ==
    /// Creates a bare record with no attributes.
    pub fn new(key: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            attributes: BTreeMap::new(),
            action_history: BTreeMap::new(),
            counters: BTreeMap::new(),
            created_at,
            revision: 0,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<i64> {
        self.attributes.get(name).copied()
    }

    pub fn history(&self, action: &str) -> Option<&BoundedHistory> {
        self.action_history.get(action)
    }

    /// History for `action` resized to `capacity`, created if missing.
    pub fn history_mut(&mut self, action: &str, capacity: usize) -> &mut BoundedHistory {
        let history = self
            .action_history
            .entry(action.to_string())
            .or_insert_with(|| BoundedHistory::new(capacity));
        history.set_capacity(capacity);
        history
    }

    pub fn counter(&self, action: &str) -> u64 {
        self.counters.get(action).copied().unwrap_or(0)
    }

    /// Adds one to the action's counter and returns the new total.
    pub fn increment_counter(&mut self, action: &str) -> u64 {
        let count = self.counters.entry(action.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }
}

// == Record Patch ==
/// Partial record merged over the current one, map entry by map entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default)]
    pub attributes: BTreeMap<String, i64>,
    /// Replacement histories; trimmed to the action's window limit
    #[serde(default)]
    pub action_history: BTreeMap<String, Vec<DateTime<Utc>>>,
    #[serde(default)]
    pub counters: BTreeMap<String, u64>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: impl Into<String>, value: i64) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn counter(mut self, action: impl Into<String>, value: u64) -> Self {
        self.counters.insert(action.into(), value);
        self
    }

    pub fn history(mut self, action: impl Into<String>, stamps: Vec<DateTime<Utc>>) -> Self {
        self.action_history.insert(action.into(), stamps);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.action_history.is_empty() && self.counters.is_empty()
    }

    // == Apply ==
    /// Merges the patch into `record`.
    ///
    /// Attribute values are clamped to their declared bounds. Undeclared
    /// attributes and counters that would go backwards are rejected before
    /// anything is written.
    pub fn apply(&self, record: &mut EntityRecord, schema: &RecordSchema) -> Result<()> {
        self.apply_with_limits(record, schema, &BTreeMap::new())
    }

    /// Same as [`apply`](Self::apply), sizing each replaced history by
    /// `limits[action]`. Actions without a limit keep the capacity they
    /// already have, or [`DEFAULT_HISTORY_CAPACITY`] for a new history.
    pub fn apply_with_limits(
        &self,
        record: &mut EntityRecord,
        schema: &RecordSchema,
        limits: &BTreeMap<String, usize>,
    ) -> Result<()> {
        for name in self.attributes.keys() {
            if schema.bounds(name).is_none() {
                return Err(RecordError::InvalidRequest(format!(
                    "attribute '{}' is not declared",
                    name
                )));
            }
        }
        for (action, value) in &self.counters {
            let current = record.counter(action);
            if *value < current {
                return Err(RecordError::InvalidRequest(format!(
                    "counter '{}' cannot decrease from {} to {}",
                    action, current, value
                )));
            }
        }

        for (name, value) in &self.attributes {
            if let Some(bounds) = schema.bounds(name) {
                record.attributes.insert(name.clone(), bounds.clamp(*value));
            }
        }
        for (action, stamps) in &self.action_history {
            let capacity = limits
                .get(action)
                .copied()
                .or_else(|| record.history(action).map(BoundedHistory::capacity))
                .unwrap_or(DEFAULT_HISTORY_CAPACITY);
            record.action_history.insert(
                action.clone(),
                BoundedHistory::from_entries(capacity, stamps.iter().copied()),
            );
        }
        for (action, value) in &self.counters {
            record.counters.insert(action.clone(), *value);
        }
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AttributeBounds;
    use chrono::Duration;

    fn schema() -> RecordSchema {
        RecordSchema::default().with_attribute("thirst", AttributeBounds::new(0, 100))
    }

    #[test]
    fn test_increment_counter() {
        let mut record = EntityRecord::new("u1", Utc::now());
        assert_eq!(record.counter("drink"), 0);
        assert_eq!(record.increment_counter("drink"), 1);
        assert_eq!(record.increment_counter("drink"), 2);
    }

    #[test]
    fn test_history_mut_creates_and_resizes() {
        let mut record = EntityRecord::new("u1", Utc::now());
        let now = Utc::now();
        for i in 0..5 {
            record.history_mut("drink", 5).push(now + Duration::seconds(i));
        }
        assert_eq!(record.history("drink").unwrap().len(), 5);

        record.history_mut("drink", 3);
        assert_eq!(record.history("drink").unwrap().len(), 3);
    }

    #[test]
    fn test_patch_clamps_attributes() {
        let mut record = schema().default_record("u1", Utc::now());
        RecordPatch::new()
            .attribute("thirst", 250)
            .apply(&mut record, &schema())
            .unwrap();
        assert_eq!(record.attribute("thirst"), Some(100));
    }

    #[test]
    fn test_patch_rejects_undeclared_attribute() {
        let mut record = schema().default_record("u1", Utc::now());
        let result = RecordPatch::new()
            .attribute("mana", 5)
            .apply(&mut record, &schema());
        assert!(matches!(result, Err(RecordError::InvalidRequest(_))));
    }

    #[test]
    fn test_patch_rejects_decreasing_counter() {
        let mut record = schema().default_record("u1", Utc::now());
        record.counters.insert("drink".into(), 4);
        let before = record.clone();

        let result = RecordPatch::new()
            .attribute("thirst", 10)
            .counter("drink", 3)
            .apply(&mut record, &schema());

        assert!(result.is_err());
        assert_eq!(record, before, "rejected patch must not partially apply");
    }

    #[test]
    fn test_patch_history_trimmed_to_default_capacity() {
        let mut record = schema().default_record("u1", Utc::now());
        let now = Utc::now();
        let stamps: Vec<_> = (0..6).map(|i| now + Duration::seconds(i)).collect();

        RecordPatch::new()
            .history("drink", stamps)
            .apply(&mut record, &schema())
            .unwrap();

        assert_eq!(
            record.history("drink").unwrap().len(),
            DEFAULT_HISTORY_CAPACITY
        );
    }

    #[test]
    fn test_patch_history_uses_configured_limit() {
        let mut record = schema().default_record("u1", Utc::now());
        let now = Utc::now();
        let stamps: Vec<_> = (0..6).map(|i| now + Duration::seconds(i)).collect();
        let limits = BTreeMap::from([("drink".to_string(), 5)]);

        RecordPatch::new()
            .history("drink", stamps.clone())
            .apply_with_limits(&mut record, &schema(), &limits)
            .unwrap();

        let history = record.history("drink").unwrap();
        assert_eq!(history.capacity(), 5);
        assert_eq!(history.last(), stamps.last());
    }

    #[test]
    fn test_empty_patch() {
        let patch: RecordPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
    }
}
