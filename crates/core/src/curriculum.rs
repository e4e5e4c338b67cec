//! Curriculum: courses, lessons and words.
//!
//! Curriculum CRUD is owned by the surrounding application; the engine only
//! needs read access, scoped to the requesting user through
//! `course.user_id`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::{UserId, WordId};
use crate::error::StoreError;

pub type CourseId = i64;
pub type LessonId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub user_id: UserId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Language being learned
    pub language: String,
    /// The learner's own language
    pub native_language: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: WordId,
    pub lesson_id: LessonId,
    pub text: String,
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_sentence: Option<String>,
    /// 1 (easiest) to 5
    pub difficulty_level: i64,
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for a new course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub language: String,
    pub native_language: String,
}

/// Input for a new lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLesson {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub order_index: i64,
}

/// Input for a new word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWord {
    pub text: String,
    pub translation: String,
    #[serde(default)]
    pub pronunciation: Option<String>,
    #[serde(default)]
    pub example_sentence: Option<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty_level: i64,
    pub order_index: i64,
}

fn default_difficulty() -> i64 {
    1
}

impl NewWord {
    pub fn new(text: impl Into<String>, translation: impl Into<String>, order_index: i64) -> Self {
        Self {
            text: text.into(),
            translation: translation.into(),
            pronunciation: None,
            example_sentence: None,
            difficulty_level: default_difficulty(),
            order_index,
        }
    }
}

/// Sort words into the lesson's canonical, author-defined order.
pub fn canonical_order(words: &mut [Word]) {
    words.sort_by_key(|w| (w.order_index, w.id));
}

/// Read access to the curriculum.
///
/// Every lookup is scoped to `user`; a lesson or word that exists but
/// belongs to someone else is reported as `Ok(None)`.
#[async_trait]
pub trait Curriculum: Send + Sync {
    /// Fetch a lesson owned by `user`.
    async fn lesson(&self, user: UserId, lesson: LessonId)
    -> Result<Option<Lesson>, StoreError>;

    /// All words of a lesson in canonical order, or `None` if the lesson is
    /// not visible to `user`.
    async fn lesson_words(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<Vec<Word>>, StoreError>;

    /// Fetch a word owned by `user`.
    async fn word(&self, user: UserId, word: WordId) -> Result<Option<Word>, StoreError>;
}
