//! Configuration Module
//!
//! Handles loading and validating configuration from environment variables.
//! Malformed values are rejected at load time rather than replaced by
//! defaults.

use std::collections::BTreeMap;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::actions::{default_actions, ActionDefinition, ActionRegistry};
use crate::error::{RecordError, Result};
use crate::record::{AttributeBounds, RecordSchema};

/// Server and cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Period of the cache sweeper in milliseconds
    pub sweep_interval_ms: u64,
    /// Window length for actions that do not set their own
    pub default_window_duration_ms: u64,
    /// Occurrences per window for actions that do not set their own
    pub default_window_limit: usize,
    /// Upper bound on a single store call in milliseconds
    pub store_timeout_ms: u64,
    /// Reload-and-retry attempts after a revision conflict
    pub max_write_retries: u32,
    /// How long a key stays live after its last request
    pub session_ttl_ms: u64,
    /// JSON document backing the store; in-memory when unset
    pub data_file: Option<PathBuf>,
    /// Declared attributes and their bounds
    pub attribute_bounds: RecordSchema,
    /// Gated actions by name
    pub actions: BTreeMap<String, ActionDefinition>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL_MS` - Sweeper period (default: 3600000, one hour)
    /// - `DEFAULT_WINDOW_DURATION_MS` - Action window (default: 600000)
    /// - `DEFAULT_WINDOW_LIMIT` - Actions per window (default: 3)
    /// - `STORE_TIMEOUT_MS` - Store call timeout (default: 5000)
    /// - `MAX_WRITE_RETRIES` - Conflict retries (default: 3)
    /// - `SESSION_TTL_MS` - Liveness idle timeout (default: 1800000)
    /// - `DATA_FILE` - Path of the JSON store (default: in-memory)
    /// - `ATTRIBUTE_BOUNDS` - JSON map of `name -> {low, high, default?}`
    /// - `ACTIONS` - JSON map of `name -> action definition`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            server_port: parse_var(&lookup, "SERVER_PORT", defaults.server_port)?,
            sweep_interval_ms: parse_var(&lookup, "SWEEP_INTERVAL_MS", defaults.sweep_interval_ms)?,
            default_window_duration_ms: parse_var(
                &lookup,
                "DEFAULT_WINDOW_DURATION_MS",
                defaults.default_window_duration_ms,
            )?,
            default_window_limit: parse_var(
                &lookup,
                "DEFAULT_WINDOW_LIMIT",
                defaults.default_window_limit,
            )?,
            store_timeout_ms: parse_var(&lookup, "STORE_TIMEOUT_MS", defaults.store_timeout_ms)?,
            max_write_retries: parse_var(&lookup, "MAX_WRITE_RETRIES", defaults.max_write_retries)?,
            session_ttl_ms: parse_var(&lookup, "SESSION_TTL_MS", defaults.session_ttl_ms)?,
            data_file: lookup("DATA_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            attribute_bounds: parse_json(&lookup, "ATTRIBUTE_BOUNDS", defaults.attribute_bounds)?,
            actions: parse_json(&lookup, "ACTIONS", defaults.actions)?,
        };

        config.validate()?;
        Ok(config)
    }

    // == Validate ==
    /// Rejects configurations the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_ms == 0 {
            return Err(RecordError::InvalidPolicy(
                "SWEEP_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(RecordError::InvalidPolicy(
                "STORE_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }
        self.attribute_bounds.validate()?;
        self.registry().validate(&self.attribute_bounds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_millis(self.session_ttl_ms)
    }

    /// Action registry built from the configured definitions and defaults.
    pub fn registry(&self) -> ActionRegistry {
        ActionRegistry::new(
            self.actions.clone(),
            Duration::from_millis(self.default_window_duration_ms),
            self.default_window_limit,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        let bounds = AttributeBounds::new(0, 100);
        Self {
            server_port: 3000,
            sweep_interval_ms: 60 * 60 * 1000,
            default_window_duration_ms: 10 * 60 * 1000,
            default_window_limit: 3,
            store_timeout_ms: 5000,
            max_write_retries: 3,
            session_ttl_ms: 30 * 60 * 1000,
            data_file: None,
            attribute_bounds: RecordSchema::default()
                .with_attribute("thirst", bounds)
                .with_attribute("hunger", bounds)
                .with_attribute("energy", bounds),
            actions: default_actions(),
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|err| {
            RecordError::InvalidPolicy(format!("{}={:?} is invalid: {}", name, raw, err))
        }),
    }
}

fn parse_json<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: DeserializeOwned,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|err| RecordError::InvalidPolicy(format!("{} is not valid JSON: {}", name, err))),
    }
}
