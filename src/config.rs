//! Configuration loading.

use crate::policy::PrecedencePolicy;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Resolver configuration.
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path (`":memory:"` for an in-memory database).
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Resolver configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Tie-break precedence applied after range specificity.
    #[serde(default)]
    pub precedence: PrecedencePolicy,
    /// Cap on candidate addresses considered per request. XFF chains are
    /// attacker-controlled, so the tail of an oversized list is ignored.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            precedence: PrecedencePolicy::default(),
            max_candidates: default_max_candidates(),
        }
    }
}

fn default_db_path() -> String {
    "blockd.db".to_string()
}

fn default_max_candidates() -> usize {
    16
}
