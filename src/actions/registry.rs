//! Action Registry Module
//!
//! Named action definitions loaded from configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actions::effect::{Effect, SecondaryEffect};
use crate::error::{RecordError, Result};
use crate::gate::GatePolicy;
use crate::record::RecordSchema;

// == Action Definition ==
/// How one action is gated and what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Attribute the action raises; the ceiling gates it from above
    pub attribute: String,
    /// Window length; the configured default when omitted
    #[serde(default)]
    pub window_ms: Option<u64>,
    /// Occurrences per window; the configured default when omitted
    #[serde(default)]
    pub window_limit: Option<usize>,
    /// Denial threshold; the attribute's upper bound when omitted
    #[serde(default)]
    pub ceiling: Option<i64>,
    #[serde(default)]
    pub secondary: Vec<SecondaryEffect>,
    /// Largest amount a caller may request in one action. Amounts must be
    /// positive whether or not this is set.
    #[serde(default)]
    pub max_amount: Option<i64>,
}

impl ActionDefinition {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            window_ms: None,
            window_limit: None,
            ceiling: None,
            secondary: Vec::new(),
            max_amount: None,
        }
    }

    pub fn with_secondary(mut self, attribute: impl Into<String>, ratio: f64) -> Self {
        self.secondary.push(SecondaryEffect {
            attribute: attribute.into(),
            ratio,
        });
        self
    }

    pub fn with_max_amount(mut self, max_amount: i64) -> Self {
        self.max_amount = Some(max_amount);
        self
    }
}

/// Built-in actions: drinking raises thirst and a little energy, feeding
/// raises hunger.
pub fn default_actions() -> BTreeMap<String, ActionDefinition> {
    BTreeMap::from([
        (
            "drink".to_string(),
            ActionDefinition::new("thirst")
                .with_secondary("energy", 0.3)
                .with_max_amount(15),
        ),
        (
            "feed".to_string(),
            ActionDefinition::new("hunger")
                .with_secondary("energy", 0.3)
                .with_max_amount(15),
        ),
    ])
}

// == Action Registry ==
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: BTreeMap<String, ActionDefinition>,
    default_window: Duration,
    default_limit: usize,
}

impl ActionRegistry {
    pub fn new(
        actions: BTreeMap<String, ActionDefinition>,
        default_window: Duration,
        default_limit: usize,
    ) -> Self {
        Self {
            actions,
            default_window,
            default_limit,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ActionDefinition> {
        self.actions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.actions.keys()
    }

    /// Window limit of every registered action, which is also the size
    /// of its history.
    pub fn history_limits(&self) -> BTreeMap<String, usize> {
        self.actions
            .iter()
            .map(|(name, def)| (name.clone(), def.window_limit.unwrap_or(self.default_limit)))
            .collect()
    }

    // == Validate ==
    /// Checks every definition against the schema. Run at startup.
    pub fn validate(&self, schema: &RecordSchema) -> Result<()> {
        for (name, def) in &self.actions {
            if schema.bounds(&def.attribute).is_none() {
                return Err(RecordError::InvalidPolicy(format!(
                    "action '{}' governs undeclared attribute '{}'",
                    name, def.attribute
                )));
            }
            for secondary in &def.secondary {
                if schema.bounds(&secondary.attribute).is_none() {
                    return Err(RecordError::InvalidPolicy(format!(
                        "action '{}' has undeclared secondary attribute '{}'",
                        name, secondary.attribute
                    )));
                }
                if !secondary.ratio.is_finite() {
                    return Err(RecordError::InvalidPolicy(format!(
                        "action '{}' has a non-finite ratio for '{}'",
                        name, secondary.attribute
                    )));
                }
            }
            if matches!(def.max_amount, Some(max) if max < 0) {
                return Err(RecordError::InvalidPolicy(format!(
                    "action '{}' has a negative max_amount",
                    name
                )));
            }
        }
        Ok(())
    }

    // == Resolve ==
    /// Gate policy and effect for one request of `amount` on `name`.
    pub fn resolve(
        &self,
        name: &str,
        amount: i64,
        schema: &RecordSchema,
    ) -> Result<(GatePolicy, Effect)> {
        let def = self
            .get(name)
            .ok_or_else(|| RecordError::UnknownAction(name.to_string()))?;

        if amount <= 0 {
            return Err(RecordError::InvalidRequest(format!(
                "amount for '{}' must be positive, got {}",
                name, amount
            )));
        }
        if let Some(max) = def.max_amount {
            if amount > max {
                return Err(RecordError::InvalidRequest(format!(
                    "amount {} exceeds the limit of {} for '{}'",
                    amount, max, name
                )));
            }
        }

        let window = def
            .window_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_window);
        let limit = def.window_limit.unwrap_or(self.default_limit);
        let mut policy = GatePolicy::new(window, limit);
        if let Some(ceiling) = def
            .ceiling
            .or_else(|| schema.bounds(&def.attribute).map(|b| b.high))
        {
            policy = policy.with_ceiling(ceiling);
        }

        let effect = Effect {
            attribute: def.attribute.clone(),
            delta: amount,
            secondary: def.secondary.clone(),
        };

        Ok((policy, effect))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AttributeBounds;

    fn schema() -> RecordSchema {
        RecordSchema::default()
            .with_attribute("thirst", AttributeBounds::new(0, 100))
            .with_attribute("hunger", AttributeBounds::new(0, 100))
            .with_attribute("energy", AttributeBounds::new(0, 100))
    }

    fn registry() -> ActionRegistry {
        ActionRegistry::new(default_actions(), Duration::from_secs(600), 3)
    }

    #[test]
    fn test_defaults_validate() {
        assert!(registry().validate(&schema()).is_ok());
    }

    #[test]
    fn test_resolve_uses_defaults_and_upper_bound() {
        let (policy, effect) = registry().resolve("drink", 7, &schema()).unwrap();
        assert_eq!(policy.window, Duration::from_secs(600));
        assert_eq!(policy.window_limit, 3);
        assert_eq!(policy.ceiling, Some(100));
        assert_eq!(effect.attribute, "thirst");
        assert_eq!(effect.delta, 7);
        assert_eq!(effect.secondary.len(), 1);
    }

    #[test]
    fn test_resolve_overrides() {
        let mut actions = BTreeMap::new();
        let mut def = ActionDefinition::new("thirst");
        def.window_ms = Some(1_000);
        def.window_limit = Some(5);
        def.ceiling = Some(80);
        actions.insert("sip".to_string(), def);

        let registry = ActionRegistry::new(actions, Duration::from_secs(600), 3);
        let (policy, _) = registry.resolve("sip", 1, &schema()).unwrap();
        assert_eq!(policy.window, Duration::from_secs(1));
        assert_eq!(policy.window_limit, 5);
        assert_eq!(policy.ceiling, Some(80));
    }

    #[test]
    fn test_unknown_action() {
        let result = registry().resolve("dance", 1, &schema());
        assert!(matches!(result, Err(RecordError::UnknownAction(_))));
    }

    #[test]
    fn test_amount_over_limit() {
        let result = registry().resolve("drink", 16, &schema());
        assert!(matches!(result, Err(RecordError::InvalidRequest(_))));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        for amount in [0, -1, -15] {
            let result = registry().resolve("drink", amount, &schema());
            assert!(matches!(result, Err(RecordError::InvalidRequest(_))));
        }
    }

    #[test]
    fn test_history_limits_follow_window_limits() {
        let mut actions = default_actions();
        if let Some(def) = actions.get_mut("feed") {
            def.window_limit = Some(5);
        }
        let limits = ActionRegistry::new(actions, Duration::from_secs(600), 3).history_limits();
        assert_eq!(limits.get("drink"), Some(&3));
        assert_eq!(limits.get("feed"), Some(&5));
    }

    #[test]
    fn test_validate_undeclared_attribute() {
        let schema = RecordSchema::default().with_attribute("thirst", AttributeBounds::new(0, 100));
        let result = registry().validate(&schema);
        assert!(matches!(result, Err(RecordError::InvalidPolicy(_))));
    }

    #[test]
    fn test_definition_from_json() {
        let json = r#"{"attribute": "thirst", "window_limit": 2, "secondary": [{"attribute": "energy", "ratio": 0.5}]}"#;
        let def: ActionDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.window_limit, Some(2));
        assert_eq!(def.secondary[0].ratio, 0.5);
        assert!(def.window_ms.is_none());
    }
}
