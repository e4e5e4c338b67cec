//! Read-only progress reports.

use wordcards_config::AppConfig;
use wordcards_core::{LessonId, UserId, WordId};

use super::{CommandResult, build_service, print_json};

pub async fn progress(config: &AppConfig, user: UserId, lesson: LessonId) -> CommandResult {
    let service = build_service(config).await?;
    print_json(&service.get_lesson_progress(user, lesson).await?)
}

pub async fn word(config: &AppConfig, user: UserId, word: WordId) -> CommandResult {
    let service = build_service(config).await?;
    print_json(&service.get_word_progress(user, word).await?)
}

pub async fn summary(config: &AppConfig, user: UserId) -> CommandResult {
    let service = build_service(config).await?;
    print_json(&service.progress_summary(user).await?)
}

pub async fn streak(config: &AppConfig, user: UserId) -> CommandResult {
    let service = build_service(config).await?;
    print_json(&service.streak(user).await?)
}
