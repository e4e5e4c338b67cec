//! Configuration loading and validation for wordcards.
//!
//! Loads configuration from `~/.wordcards/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.wordcards/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Memory model parameters
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Review query limits and retry policy
    #[serde(default)]
    pub review: ReviewConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL or file path
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    format!(
        "sqlite://{}",
        AppConfig::config_dir().join("wordcards.sqlite").display()
    )
}
fn default_max_connections() -> u32 {
    4
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Target recall probability when a card comes due
    #[serde(default = "default_desired_retention")]
    pub desired_retention: f64,

    #[serde(default = "default_learning_steps")]
    pub learning_steps_secs: Vec<u64>,

    #[serde(default = "default_relearning_steps")]
    pub relearning_steps_secs: Vec<u64>,

    #[serde(default = "default_maximum_interval")]
    pub maximum_interval_days: i64,

    /// Custom model weights; the built-in defaults are used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
}

fn default_desired_retention() -> f64 {
    0.9
}
fn default_learning_steps() -> Vec<u64> {
    vec![60, 600]
}
fn default_relearning_steps() -> Vec<u64> {
    vec![600]
}
fn default_maximum_interval() -> i64 {
    36500
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            desired_retention: default_desired_retention(),
            learning_steps_secs: default_learning_steps(),
            relearning_steps_secs: default_relearning_steps(),
            maximum_interval_days: default_maximum_interval(),
            weights: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_due_limit")]
    pub default_due_limit: usize,

    #[serde(default = "default_max_due_limit")]
    pub max_due_limit: usize,

    /// How often a review that lost a concurrent race is re-applied
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

fn default_due_limit() -> usize {
    20
}
fn default_max_due_limit() -> usize {
    200
}
fn default_max_conflict_retries() -> u32 {
    3
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            default_due_limit: default_due_limit(),
            max_due_limit: default_max_due_limit(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.wordcards/config.toml).
    ///
    /// Environment overrides:
    /// - `WORDCARDS_DATABASE_URL`
    /// - `WORDCARDS_DESIRED_RETENTION`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_file(&Self::config_path())
    }

    /// Load from `path`, then apply environment overrides and validate.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("WORDCARDS_DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(raw) = lookup("WORDCARDS_DESIRED_RETENTION") {
            self.scheduler.desired_retention = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "WORDCARDS_DESIRED_RETENTION must be a number, got {raw:?}"
                ))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".wordcards")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url must not be empty".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".into(),
            ));
        }

        let retention = self.scheduler.desired_retention;
        if !(retention > 0.0 && retention < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "scheduler.desired_retention must be between 0 and 1 (exclusive), got {retention}"
            )));
        }

        if self.scheduler.maximum_interval_days < 1 {
            return Err(ConfigError::ValidationError(
                "scheduler.maximum_interval_days must be at least 1".into(),
            ));
        }

        let mut steps = self
            .scheduler
            .learning_steps_secs
            .iter()
            .chain(&self.scheduler.relearning_steps_secs);
        if steps.any(|s| *s == 0) {
            return Err(ConfigError::ValidationError(
                "scheduler learning and relearning steps must be positive".into(),
            ));
        }

        if self.review.default_due_limit == 0
            || self.review.default_due_limit > self.review.max_due_limit
        {
            return Err(ConfigError::ValidationError(format!(
                "review.default_due_limit must be between 1 and max_due_limit ({})",
                self.review.max_due_limit
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            review: ReviewConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
