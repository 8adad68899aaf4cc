//! Executor configuration
//!
//! Plain data with builder-style setters. Can also be loaded from JSON;
//! missing fields fall back to their defaults.

use crate::error::{Result, RuntimeError};
use serde::{Deserialize, Serialize};

/// Configuration for an [`Executor`](crate::Executor)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Label prefixed to every log line from this executor
    pub name: String,
    /// Initial capacity of the task table
    pub task_capacity: usize,
    /// Initial capacity of the ready-queue
    pub queue_capacity: usize,
    /// Catch panics in spawned tasks instead of unwinding through `block_on`
    pub isolate_panics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "cooprt".to_string(),
            task_capacity: 64,
            queue_capacity: 64,
            isolate_panics: true,
        }
    }
}

impl Config {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn task_capacity(mut self, n: usize) -> Self {
        self.task_capacity = n;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    pub fn isolate_panics(mut self, isolate: bool) -> Self {
        self.isolate_panics = isolate;
        self
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| RuntimeError::InvalidConfig {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the builder cannot enforce
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RuntimeError::InvalidConfig {
                reason: "name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder() {
        let config = Config::default()
            .name("worker")
            .task_capacity(8)
            .queue_capacity(16)
            .isolate_panics(false);

        assert_eq!(config.name, "worker");
        assert_eq!(config.task_capacity, 8);
        assert_eq!(config.queue_capacity, 16);
        assert!(!config.isolate_panics);
    }

    #[test]
    fn test_from_json_partial_uses_defaults() {
        let config = Config::from_json(r#"{ "name": "echo" }"#).unwrap();
        assert_eq!(config, Config::default().name("echo"));
    }

    #[test]
    fn test_from_json_rejects_empty_name() {
        let err = Config::from_json(r#"{ "name": "  " }"#).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidConfig { .. }));
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let err = Config::from_json("{ task_capacity: }").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidConfig { .. }));
    }

    #[test]
    fn test_json_round_trip_preserves_fields() {
        let config = Config::default().name("rt").task_capacity(3);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(Config::from_json(&json).unwrap(), config);
    }
}
