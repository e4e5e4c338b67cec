//! `wordcards seed` imports a course from a TOML file.
//!
//! ```toml
//! [course]
//! title = "Portuguese"
//! language = "pt"
//! native_language = "en"
//!
//! [[lessons]]
//! title = "Greetings"
//! order_index = 1
//!
//! [[lessons.words]]
//! text = "olá"
//! translation = "hello"
//! order_index = 0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use wordcards_config::AppConfig;
use wordcards_core::{CourseId, LessonId, NewCourse, NewLesson, NewWord, StoreError, UserId};
use wordcards_store::SqliteStore;

use super::{CommandResult, open_store, print_json};

#[derive(Debug, Clone, Deserialize)]
pub struct SeedFile {
    pub course: NewCourse,
    #[serde(default)]
    pub lessons: Vec<SeedLesson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedLesson {
    #[serde(flatten)]
    pub lesson: NewLesson,
    #[serde(default)]
    pub words: Vec<NewWord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub course_id: CourseId,
    pub lesson_ids: Vec<LessonId>,
    pub words: usize,
}

pub fn parse(content: &str) -> Result<SeedFile, toml::de::Error> {
    toml::from_str(content)
}

/// Create the course, its lessons and their words for `user`.
pub async fn import(
    store: &SqliteStore,
    user: UserId,
    seed: SeedFile,
) -> Result<SeedReport, StoreError> {
    let course = store.create_course(user, seed.course).await?;
    let mut report = SeedReport {
        course_id: course.id,
        lesson_ids: Vec::with_capacity(seed.lessons.len()),
        words: 0,
    };

    for entry in seed.lessons {
        let lesson = store.create_lesson(course.id, entry.lesson).await?;
        for word in entry.words {
            store.create_word(lesson.id, word).await?;
            report.words += 1;
        }
        report.lesson_ids.push(lesson.id);
    }

    info!(
        course = course.id,
        lessons = report.lesson_ids.len(),
        words = report.words,
        "Course imported"
    );
    Ok(report)
}

pub async fn run(config: &AppConfig, user: UserId, file: &Path) -> CommandResult {
    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let seed = parse(&content).map_err(|e| format!("Failed to parse {}: {e}", file.display()))?;

    let store = open_store(config).await?;
    let report = import(&store, user, seed).await?;
    print_json(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordcards_core::{CardStore, Curriculum};

    const COURSE: &str = r#"
[course]
title = "Portuguese"
language = "pt"
native_language = "en"

[[lessons]]
title = "Greetings"
order_index = 1

[[lessons.words]]
text = "olá"
translation = "hello"
order_index = 0

[[lessons.words]]
text = "tchau"
translation = "bye"
difficulty_level = 2
order_index = 1

[[lessons]]
title = "Numbers"
description = "One to ten"
order_index = 2
"#;

    #[test]
    fn test_parse_course_file() {
        let seed = parse(COURSE).unwrap();
        assert_eq!(seed.course.language, "pt");
        assert_eq!(seed.lessons.len(), 2);
        assert_eq!(seed.lessons[0].words.len(), 2);
        assert_eq!(seed.lessons[0].words[0].difficulty_level, 1);
        assert_eq!(seed.lessons[0].words[1].difficulty_level, 2);
        assert_eq!(
            seed.lessons[1].lesson.description.as_deref(),
            Some("One to ten")
        );
        assert!(seed.lessons[1].words.is_empty());
    }

    #[test]
    fn test_word_without_translation_is_rejected() {
        let bad = "[course]\ntitle = \"x\"\nlanguage = \"pt\"\nnative_language = \"en\"\n\n\
                   [[lessons]]\ntitle = \"a\"\norder_index = 0\n\n\
                   [[lessons.words]]\ntext = \"olá\"\norder_index = 0\n";
        assert!(parse(bad).is_err());
    }

    #[tokio::test]
    async fn test_import_creates_visible_curriculum() {
        let store = SqliteStore::in_memory().await.unwrap();
        let report = import(&store, 7, parse(COURSE).unwrap()).await.unwrap();
        assert_eq!(report.lesson_ids.len(), 2);
        assert_eq!(report.words, 2);

        let words = store
            .lesson_words(7, report.lesson_ids[0])
            .await
            .unwrap()
            .unwrap();
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["olá", "tchau"]);

        // Another user cannot see the imported lesson.
        let foreign = store.lesson_words(8, report.lesson_ids[0]).await.unwrap();
        assert!(foreign.is_none());
        assert!(store.cards_for_user(7).await.unwrap().is_empty());
    }
}
