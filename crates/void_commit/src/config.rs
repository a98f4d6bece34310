//! Runtime configuration
//!
//! Loaded from TOML; every table and field is optional:
//!
//! ```toml
//! [diff]
//! incremental_threshold = 1000
//! cache_capacity = 1000
//! enable_optimizer = true
//!
//! [pool]
//! max_pool_size = 2000
//! max_idle_secs = 300
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use void_diff::DiffConfig;
use void_memory::PoolConfig;

/// Errors from configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration for [`VdomRuntime`](crate::VdomRuntime)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Diffing engine settings
    pub diff: DiffConfig,
    /// Patch pool settings
    pub pool: PoolConfig,
}

impl RuntimeConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Set the diffing configuration
    pub fn with_diff(mut self, diff: DiffConfig) -> Self {
        self.diff = diff;
        self
    }

    /// Set the pool configuration
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(RuntimeConfig::from_toml_str("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_partial_tables() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [diff]
            incremental_threshold = 50
            enable_cache = false

            [pool]
            max_pool_size = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.diff.incremental_threshold, 50);
        assert!(!config.diff.enable_cache);
        assert_eq!(config.diff.cache_capacity, 1000);
        assert_eq!(config.pool.max_pool_size, 16);
        assert_eq!(config.pool.max_idle_secs, 300);
    }

    #[test]
    fn test_parse_error() {
        let err = RuntimeConfig::from_toml_str("[diff]\nincremental_threshold = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RuntimeConfig::load("/nonexistent/vdom.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
