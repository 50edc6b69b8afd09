//! Action Processor Module
//!
//! Runs one gated action end to end: load, decide, mutate, write through.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::actions::effect::{current_value, AttributeChange, Effect};
use crate::cache::{Mutation, RecordCache};
use crate::error::{RecordError, Result};
use crate::gate::{Decision, DenyReason, GatePolicy, RateGate};
use crate::record::EntityRecord;

// == Outcome ==
/// Result of [`ActionProcessor::perform`]. A denial is a normal outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Applied {
        record: EntityRecord,
        changes: Vec<AttributeChange>,
        /// Further occurrences the gate would admit right now
        remaining: usize,
    },
    Denied {
        reason: DenyReason,
    },
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied { .. })
    }

    /// Whether the caller can offer an immediate repeat.
    pub fn can_repeat(&self) -> bool {
        matches!(self, Outcome::Applied { remaining, .. } if *remaining > 0)
    }
}

enum Step {
    Applied(Vec<AttributeChange>),
    Denied(DenyReason),
}

// == Action Processor ==
#[derive(Clone)]
pub struct ActionProcessor {
    cache: Arc<RecordCache>,
}

impl ActionProcessor {
    pub fn new(cache: Arc<RecordCache>) -> Self {
        Self { cache }
    }

    // == Perform ==
    /// Performs `action` on the record under `key` at the current time.
    ///
    /// The record is created with defaults if it does not exist yet.
    pub async fn perform(
        &self,
        key: &str,
        action: &str,
        policy: &GatePolicy,
        effect: &Effect,
    ) -> Result<Outcome> {
        self.perform_at(key, action, policy, effect, Utc::now()).await
    }

    /// Same as [`perform`](Self::perform) with an explicit clock reading.
    pub async fn perform_at(
        &self,
        key: &str,
        action: &str,
        policy: &GatePolicy,
        effect: &Effect,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let gate = RateGate::new(policy.clone());
        let schema = self.cache.schema();

        let result = self
            .cache
            .modify(key, true, |record| {
                let value = current_value(record, schema, &effect.attribute)?;
                if let Decision::Denied { reason } = gate.check(value, record.history(action), now) {
                    return Ok(Mutation::Discard(Step::Denied(reason)));
                }

                record.history_mut(action, policy.window_limit).push(now);
                let changes = effect.apply(record, schema)?;
                record.increment_counter(action);
                Ok(Mutation::Commit(Step::Applied(changes)))
            })
            .await?;

        let Some((record, step)) = result else {
            return Err(RecordError::NotFound(key.to_string()));
        };

        match step {
            Step::Denied(reason) => {
                debug!("Action '{}' denied for '{}': {:?}", action, key, reason);
                Ok(Outcome::Denied { reason })
            }
            Step::Applied(changes) => {
                let value = current_value(&record, schema, &effect.attribute)?;
                let remaining = gate.check(value, record.history(action), now).remaining();
                info!(
                    "Action '{}' applied for '{}' (count {}, {} more allowed)",
                    action,
                    key,
                    record.counter(action),
                    remaining
                );
                Ok(Outcome::Applied {
                    record,
                    changes,
                    remaining,
                })
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOptions;
    use crate::record::{AttributeBounds, RecordPatch, RecordSchema};
    use crate::store::{MemoryStore, RecordStore};
    use chrono::{TimeDelta, TimeZone};
    use std::time::Duration;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + TimeDelta::minutes(minute)
    }

    fn setup() -> (Arc<MemoryStore>, Arc<RecordCache>, ActionProcessor) {
        let store = Arc::new(MemoryStore::new());
        let schema = RecordSchema::default()
            .with_attribute("thirst", AttributeBounds::new(0, 100))
            .with_attribute("energy", AttributeBounds::new(0, 100));
        let cache = Arc::new(RecordCache::new(
            store.clone(),
            schema,
            CacheOptions::default(),
        ));
        let processor = ActionProcessor::new(cache.clone());
        (store, cache, processor)
    }

    fn policy() -> GatePolicy {
        GatePolicy::new(Duration::from_secs(600), 3).with_ceiling(100)
    }

    fn drink(amount: i64) -> Effect {
        Effect::new("thirst", amount).with_secondary("energy", 0.3)
    }

    #[tokio::test]
    async fn test_perform_clamps_stored_values_outside_bounds() {
        let (store, _cache, processor) = setup();
        let mut stale = EntityRecord::new("u1", at(0));
        stale.attributes.insert("thirst".into(), 40);
        stale.attributes.insert("energy".into(), 150);
        store.put_raw(stale).await;

        let outcome = processor
            .perform_at("u1", "drink", &policy(), &Effect::new("thirst", 5), at(1))
            .await
            .unwrap();

        let Outcome::Applied { record, .. } = outcome else {
            panic!("expected the action to apply");
        };
        assert_eq!(record.attribute("thirst"), Some(45));
        assert_eq!(record.attribute("energy"), Some(100));

        let stored = store.find("u1").await.unwrap().unwrap();
        assert_eq!(stored.attribute("energy"), Some(100));
    }

    #[tokio::test]
    async fn test_three_applied_then_denied() {
        let (store, _cache, processor) = setup();

        let mut last = None;
        for (i, minute) in [0, 0, 1].iter().enumerate() {
            let outcome = processor
                .perform_at("u1", "drink", &policy(), &drink(10), at(*minute))
                .await
                .unwrap();
            let Outcome::Applied { record, remaining, .. } = outcome else {
                panic!("attempt {} should apply", i + 1);
            };
            assert_eq!(record.attribute("thirst"), Some(10 * (i as i64 + 1)));
            assert_eq!(remaining, 2 - i);
            last = Some(record);
        }

        let outcome = processor
            .perform_at("u1", "drink", &policy(), &drink(10), at(2))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Denied {
                reason: DenyReason::WindowFull { .. }
            }
        ));

        let stored = store.find("u1").await.unwrap().unwrap();
        let last = last.unwrap();
        assert_eq!(stored, last);
        assert_eq!(stored.counter("drink"), 3);
        assert_eq!(stored.attribute("thirst"), Some(30));
    }

    #[tokio::test]
    async fn test_window_slides() {
        let (_store, _cache, processor) = setup();
        for minute in [0, 1, 5] {
            let outcome = processor
                .perform_at("u1", "drink", &policy(), &drink(1), at(minute))
                .await
                .unwrap();
            assert!(outcome.is_applied());
        }

        let denied = processor
            .perform_at("u1", "drink", &policy(), &drink(1), at(6))
            .await
            .unwrap();
        assert!(!denied.is_applied());

        let applied = processor
            .perform_at("u1", "drink", &policy(), &drink(1), at(11))
            .await
            .unwrap();
        assert!(applied.is_applied());
    }

    #[tokio::test]
    async fn test_ceiling_denies() {
        let (_store, cache, processor) = setup();
        cache
            .update("u1", &RecordPatch::new().attribute("thirst", 100), true)
            .await
            .unwrap();

        let outcome = processor
            .perform_at("u1", "drink", &policy(), &drink(5), at(0))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Denied {
                reason: DenyReason::AtCapacity {
                    value: 100,
                    ceiling: 100
                }
            }
        ));
    }

    #[tokio::test]
    async fn test_reaching_ceiling_disables_repeat() {
        let (_store, cache, processor) = setup();
        cache
            .update("u1", &RecordPatch::new().attribute("thirst", 95), true)
            .await
            .unwrap();

        let outcome = processor
            .perform_at("u1", "drink", &policy(), &drink(15), at(0))
            .await
            .unwrap();

        let Outcome::Applied { ref record, ref changes, remaining } = outcome else {
            panic!("expected applied");
        };
        assert_eq!(record.attribute("thirst"), Some(100));
        assert_eq!(record.attribute("energy"), Some(1));
        assert_eq!(changes[0].applied(), 5);
        assert_eq!(remaining, 0);
        assert!(!outcome.can_repeat());
    }

    #[tokio::test]
    async fn test_history_trimmed_to_window_limit() {
        let (_store, _cache, processor) = setup();
        for minute in [0, 20, 40, 60, 80] {
            let outcome = processor
                .perform_at("u1", "drink", &policy(), &drink(1), at(minute))
                .await
                .unwrap();
            let Outcome::Applied { record, .. } = outcome else {
                panic!("spread-out actions should apply");
            };
            assert!(record.history("drink").unwrap().len() <= 3);
        }
    }

    #[tokio::test]
    async fn test_concurrent_performs_respect_limit() {
        let (store, _cache, processor) = setup();
        store.set_latency(Duration::from_millis(5));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let processor = processor.clone();
                tokio::spawn(async move {
                    processor
                        .perform_at("u1", "drink", &policy(), &drink(1), at(0))
                        .await
                })
            })
            .collect();

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_applied() {
                applied += 1;
            }
        }

        assert_eq!(applied, 3);
        let stored = store.find("u1").await.unwrap().unwrap();
        assert_eq!(stored.counter("drink"), 3);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_and_keeps_cache() {
        let (store, cache, processor) = setup();
        let before = cache.get_or_create("u1", true).await.unwrap().unwrap();

        store.fail_writes(true);
        let result = processor
            .perform_at("u1", "drink", &policy(), &drink(5), at(0))
            .await;

        assert!(matches!(result, Err(RecordError::StoreUnavailable(_))));
        assert_eq!(cache.get_or_create("u1", false).await.unwrap(), Some(before));
    }
}
