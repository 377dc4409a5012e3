//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::analyzer::MAX_ITERATIONS;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cap on analyzer rewrite passes.
    pub max_iterations: usize,
    /// Current database of contexts created by the engine. Falls back to
    /// the first registered database.
    pub default_database: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            default_database: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the analyzer pass cap.
    pub fn max_iterations(mut self, value: usize) -> Self {
        self.max_iterations = value;
        self
    }

    /// Set the default database.
    pub fn default_database(mut self, name: impl Into<String>) -> Self {
        self.default_database = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_iterations, 1000);
        assert!(config.default_database.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new().max_iterations(10).default_database("mydb");
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.default_database.as_deref(), Some("mydb"));

        let parsed: EngineConfig =
            serde_json::from_str(r#"{"default_database": "mydb", "max_iterations": 10}"#).unwrap();
        assert_eq!(parsed, config);
    }
}
