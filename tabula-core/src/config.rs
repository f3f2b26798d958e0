//! Configuration management for Tabula
//!
//! This module provides:
//! - Engine settings consumed by tables and their executors
//! - Logging settings consumed by binaries
//! - TOML loading, saving and validation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::logging::LoggingConfig;

/// Tabula configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabulaConfig {
    /// Query engine settings
    pub engine: EngineSettings,
    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Executor operations at or above this duration are reported as slow
    pub slow_query_threshold_ms: u64,
    /// Enable slow query reporting
    pub slow_query_logging: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 100,
            slow_query_logging: true,
        }
    }
}

impl TabulaConfig {
    /// Load configuration from a file, falling back to defaults when it does
    /// not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TabulaConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let level = self.logging.level.to_uppercase();
        if !["ERROR", "WARN", "INFO", "DEBUG", "TRACE"].contains(&level.as_str()) {
            return Err(anyhow::anyhow!(
                "Unknown log level: {}",
                self.logging.level
            ));
        }

        if self.engine.slow_query_logging && self.engine.slow_query_threshold_ms == 0 {
            return Err(anyhow::anyhow!(
                "Slow query threshold cannot be 0 while slow query logging is enabled"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = TabulaConfig::default();
        assert_eq!(config.engine.slow_query_threshold_ms, 100);
        assert!(config.engine.slow_query_logging);
        assert_eq!(config.logging.level, "INFO");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TabulaConfig::default();
        config.logging.level = "LOUD".into();
        assert!(config.validate().is_err());

        let mut config = TabulaConfig::default();
        config.engine.slow_query_threshold_ms = 0;
        assert!(config.validate().is_err());
        config.engine.slow_query_logging = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = TabulaConfig::from_toml_str(
            r#"
            [engine]
            slow_query_threshold_ms = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.slow_query_threshold_ms, 5);
        assert!(config.engine.slow_query_logging);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = TabulaConfig::load(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, TabulaConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("conf").join("tabula.toml");

        let mut config = TabulaConfig::default();
        config.engine.slow_query_threshold_ms = 250;
        config.logging.json_format = true;
        config.save(&config_path).unwrap();

        let loaded = TabulaConfig::load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        std::fs::write(&config_path, "engine = 3").unwrap();

        let err = TabulaConfig::load(&config_path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
