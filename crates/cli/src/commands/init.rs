//! `wordcards init` writes the default config and create the database.

use std::path::Path;
use wordcards_config::AppConfig;

use super::{CommandResult, database_file, open_store};

pub async fn run(config_path: &Path, config: &AppConfig) -> CommandResult {
    if let Some(dir) = config_path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        std::fs::create_dir_all(dir)?;
        println!("Created config directory: {}", dir.display());
    }

    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
    } else {
        std::fs::write(config_path, AppConfig::default_toml())?;
        println!("Created config at: {}", config_path.display());
    }

    if let Some(file) = database_file(&config.database.url)
        && let Some(dir) = file.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }

    // Opening the store runs the migrations.
    open_store(config).await?;
    println!("Database ready: {}", config.database.url);
    println!("\nNext: wordcards seed <course.toml>");

    Ok(())
}
