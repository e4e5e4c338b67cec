//! Commands that change a learner's state: `rate`, `start`, `rebuild`,
//! plus the `due` and `session` queries that drive them.

use wordcards_config::AppConfig;
use wordcards_core::{LessonId, Rating, UserId, WordId};

use super::{CommandResult, build_service, print_json};

pub async fn rate(
    config: &AppConfig,
    user: UserId,
    word: WordId,
    rating: Rating,
    lesson: Option<LessonId>,
    latency: Option<f64>,
) -> CommandResult {
    let service = build_service(config).await?;
    let outcome = service
        .submit_rating(user, word, rating, lesson, latency)
        .await?;
    print_json(&outcome)
}

pub async fn due(config: &AppConfig, user: UserId, limit: Option<usize>) -> CommandResult {
    let service = build_service(config).await?;
    let words = service.get_due_words(user, limit).await?;
    if words.is_empty() {
        tracing::info!("Nothing due");
    }
    print_json(&words)
}

pub async fn session(config: &AppConfig, user: UserId, lesson: LessonId) -> CommandResult {
    let service = build_service(config).await?;
    print_json(&service.get_review_session(user, lesson).await?)
}

pub async fn start(config: &AppConfig, user: UserId, lesson: LessonId) -> CommandResult {
    let service = build_service(config).await?;
    print_json(&service.start_lesson(user, lesson).await?)
}

pub async fn rebuild(config: &AppConfig, user: UserId, word: WordId) -> CommandResult {
    let service = build_service(config).await?;
    print_json(&service.rebuild_card(user, word).await?)
}
