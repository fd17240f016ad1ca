#![deny(missing_docs)]

//! # Engine Configuration
//!
//! Settings shared by rule validation, value generation and the CLI. Loaded
//! from YAML (or JSON, which YAML accepts); every field is optional and falls
//! back to its default.

use crate::error::{AppError, AppResult};
use crate::explorer::DEFAULT_MAX_ITERATIONS;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EngineConfig {
    /// Seed of the random source.
    pub seed: u64,
    /// Attempt cap of the domain explorer.
    pub exploration_max_iterations: usize,
    /// Base URL of the rule-extraction service, if one is available.
    pub rule_extraction_url: Option<String>,
    /// Default log filter (overridden by `RUST_LOG`).
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            exploration_max_iterations: DEFAULT_MAX_ITERATIONS,
            rule_extraction_url: None,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parses a YAML (or JSON) document.
    pub fn from_yaml_str(source: &str) -> AppResult<Self> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: EngineConfig = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }

    /// Rejects settings that would make the engine useless.
    pub fn validate(&self) -> AppResult<()> {
        if self.exploration_max_iterations == 0 {
            return Err(AppError::General(
                "exploration_max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = EngineConfig::from_yaml_str("seed: 42\n").unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.exploration_max_iterations, 70);
        assert_eq!(config.log_level, "info");
        assert_eq!(EngineConfig::from_yaml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_json_is_accepted() {
        let config =
            EngineConfig::from_yaml_str(r#"{"rule_extraction_url": "http://localhost:4000"}"#)
                .unwrap();
        assert_eq!(
            config.rule_extraction_url.as_deref(),
            Some("http://localhost:4000")
        );
    }

    #[test]
    fn test_zero_iterations_rejected() {
        assert!(EngineConfig::from_yaml_str("exploration_max_iterations: 0").is_err());
        assert!(matches!(
            EngineConfig::from_yaml_str("seed: [1"),
            Err(AppError::Yaml(_))
        ));
    }
}
