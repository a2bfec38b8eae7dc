use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::conflict::ConflictCheck;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const ENV_CONFLICT_CHECK: &str = "ARTICLESTORE_CONFLICT_CHECK";
pub const ENV_LOG_LEVEL: &str = "ARTICLESTORE_LOG";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct StoreConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct StoreSection {
    pub conflict_check: Option<ConflictCheck>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct LoggingSection {
    pub level: Option<String>,
}

impl StoreConfig {
    /// Resolve the conflict exemption mode: env > config > literal.
    pub fn conflict_check(&self) -> Result<ConflictCheck> {
        self.conflict_check_with_lookup(|key| env::var(key).ok())
    }

    /// Resolve the log level: env > config > DEFAULT_LOG_LEVEL.
    pub fn log_level(&self) -> String {
        if let Ok(value) = env::var(ENV_LOG_LEVEL) {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return trimmed;
            }
        }
        self.logging
            .level
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    fn conflict_check_with_lookup<F>(&self, lookup_env: F) -> Result<ConflictCheck>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup_env(ENV_CONFLICT_CHECK)
            && !value.trim().is_empty()
        {
            return match ConflictCheck::parse(&value) {
                Some(mode) => Ok(mode),
                None => bail!(
                    "{ENV_CONFLICT_CHECK} must be `literal` or `normalized`, got `{}`",
                    value.trim()
                ),
            };
        }
        Ok(self.store.conflict_check.unwrap_or_default())
    }
}

/// Load and parse a StoreConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<StoreConfig> {
    if !config_path.exists() {
        return Ok(StoreConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: StoreConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}
