//! wordcards CLI entry point.
//!
//! Commands:
//! - `init`     Write the default config and create the database
//! - `seed`     Import a course from a TOML file
//! - `rate`     Rate a word
//! - `due`      List words due for review
//! - `session`  Compose a review session for a lesson
//! - `progress` Show lesson progress
//! - `summary`  Show overall progress

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wordcards_config::AppConfig;
use wordcards_core::Rating;

mod commands;

#[derive(Parser)]
#[command(
    name = "wordcards",
    about = "Spaced-repetition word learning",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this config file instead of ~/.wordcards/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act as this user
    #[arg(short, long, global = true, env = "WORDCARDS_USER", default_value_t = 1)]
    user: i64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration and create the database
    Init,

    /// Import a course with its lessons and words from a TOML file
    Seed { file: PathBuf },

    /// Rate a word: again, hard, good, easy (or 1-4)
    Rate {
        word: i64,

        #[arg(value_parser = parse_rating)]
        rating: Rating,

        /// Lesson the rating was given in
        #[arg(short, long)]
        lesson: Option<i64>,

        /// Seconds the learner took to answer
        #[arg(long)]
        latency: Option<f64>,
    },

    /// List words due for review, most overdue first
    Due {
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a lesson's progress
    Progress { lesson: i64 },

    /// Split a lesson into new words and words to review
    Session { lesson: i64 },

    /// Show the memory state of one word
    Word { word: i64 },

    /// Overall progress across lessons
    Summary,

    /// Mark a lesson as started
    Start { lesson: i64 },

    /// Show the daily streak
    Streak,

    /// Recompute a word's memory state from its review log
    Rebuild { word: i64 },
}

fn parse_rating(raw: &str) -> Result<Rating, String> {
    let rating = match raw.to_ascii_lowercase().as_str() {
        "again" => Rating::Again,
        "hard" => Rating::Hard,
        "good" => Rating::Good,
        "easy" => Rating::Easy,
        other => {
            let value: i64 = other
                .parse()
                .map_err(|_| format!("unknown rating {raw:?}"))?;
            Rating::try_from(value).map_err(|e| e.to_string())?
        }
    };
    Ok(rating)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.unwrap_or_else(AppConfig::config_path);
    let config = commands::load_config(&config_path)?;
    let user = cli.user;

    match cli.command {
        Commands::Init => commands::init::run(&config_path, &config).await?,
        Commands::Seed { file } => commands::seed::run(&config, user, &file).await?,
        Commands::Rate {
            word,
            rating,
            lesson,
            latency,
        } => commands::learn::rate(&config, user, word, rating, lesson, latency).await?,
        Commands::Due { limit } => commands::learn::due(&config, user, limit).await?,
        Commands::Session { lesson } => commands::learn::session(&config, user, lesson).await?,
        Commands::Start { lesson } => commands::learn::start(&config, user, lesson).await?,
        Commands::Rebuild { word } => commands::learn::rebuild(&config, user, word).await?,
        Commands::Progress { lesson } => commands::report::progress(&config, user, lesson).await?,
        Commands::Word { word } => commands::report::word(&config, user, word).await?,
        Commands::Summary => commands::report::summary(&config, user).await?,
        Commands::Streak => commands::report::streak(&config, user).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ratings_parse_by_name_or_number() {
        assert_eq!(parse_rating("good"), Ok(Rating::Good));
        assert_eq!(parse_rating("EASY"), Ok(Rating::Easy));
        assert_eq!(parse_rating("1"), Ok(Rating::Again));
        assert!(parse_rating("5").is_err());
        assert!(parse_rating("meh").is_err());
    }

    #[test]
    fn rate_command_parses() {
        let cli = Cli::try_parse_from(["wordcards", "rate", "7", "hard", "--lesson", "3"])
            .unwrap();
        match cli.command {
            Commands::Rate {
                word,
                rating,
                lesson,
                latency,
            } => {
                assert_eq!(word, 7);
                assert_eq!(rating, Rating::Hard);
                assert_eq!(lesson, Some(3));
                assert_eq!(latency, None);
            }
            _ => panic!("expected rate"),
        }
    }
}
