//! Subcommand implementations and the wiring they share.

pub mod init;
pub mod learn;
pub mod report;
pub mod seed;

use chrono::Duration;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wordcards_config::{AppConfig, SchedulerConfig};
use wordcards_engine::{LearningService, ServiceSettings};
use wordcards_fsrs::{FsrsParameters, FsrsScheduler};
use wordcards_store::SqliteStore;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Load the config file at `path`, falling back to defaults when absent.
pub fn load_config(path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load_file(path).map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}

/// Translate the `[scheduler]` section into FSRS parameters.
pub fn scheduler_parameters(
    config: &SchedulerConfig,
) -> Result<FsrsParameters, Box<dyn std::error::Error>> {
    let steps = |secs: &[u64]| -> Result<Vec<Duration>, String> {
        secs.iter()
            .map(|s| {
                i64::try_from(*s)
                    .map(Duration::seconds)
                    .map_err(|_| format!("step of {s} seconds is out of range"))
            })
            .collect()
    };

    let mut params = FsrsParameters::default()
        .with_desired_retention(config.desired_retention)
        .with_learning_steps(steps(&config.learning_steps_secs)?)
        .with_relearning_steps(steps(&config.relearning_steps_secs)?)
        .with_maximum_interval_days(config.maximum_interval_days);
    if let Some(weights) = &config.weights {
        params = params.with_weights(weights)?;
    }
    Ok(params)
}

/// Local file behind a `sqlite://` url, if it names one.
pub fn database_file(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

pub async fn open_store(
    config: &AppConfig,
) -> Result<Arc<SqliteStore>, Box<dyn std::error::Error>> {
    let store = SqliteStore::new(&config.database.url, config.database.max_connections)
        .await
        .map_err(|e| format!("Failed to open database {}: {e}", config.database.url))?;
    Ok(Arc::new(store))
}

pub async fn build_service(
    config: &AppConfig,
) -> Result<LearningService, Box<dyn std::error::Error>> {
    let parameters = scheduler_parameters(&config.scheduler)?;
    let model = Arc::new(FsrsScheduler::new(parameters)?);
    let store = open_store(config).await?;
    let settings = ServiceSettings {
        default_due_limit: config.review.default_due_limit,
        max_due_limit: config.review.max_due_limit,
        max_conflict_retries: config.review.max_conflict_retries,
    };
    Ok(LearningService::new(model, store, settings))
}

pub fn print_json<T: Serialize>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
