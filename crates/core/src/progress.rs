//! Progress projections: per-word, per-lesson, per-session, per-user.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::card::{Card, Stage, UserId, WordId};
use crate::curriculum::{LessonId, Word};

/// Read-only view of one card combining stored counters with
/// memory-model quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordProgress {
    pub state: Stage,
    pub is_due: bool,
    pub next_review_at: DateTime<Utc>,
    pub total_reviews: i64,
    pub correct_reviews: i64,
    /// In `[0, 1]`; 0 before the first review
    pub accuracy_rate: f64,
    /// Estimated recall probability, in `[0, 1]`
    pub retrievability: f64,
}

impl WordProgress {
    pub fn is_learned(&self) -> bool {
        self.state.is_learned()
    }
}

/// Per-word report for a caller, including words never reviewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordProgressReport {
    pub word_id: WordId,
    /// `None` until the first review
    pub state: Option<Stage>,
    pub is_learned: bool,
    pub is_due: bool,
    pub total_reviews: i64,
    pub correct_reviews: i64,
    pub accuracy_rate: f64,
    pub retrievability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
}

impl WordProgressReport {
    /// Report for a word the user has never rated.
    pub fn unreviewed(word_id: WordId) -> Self {
        Self {
            word_id,
            state: None,
            is_learned: false,
            is_due: false,
            total_reviews: 0,
            correct_reviews: 0,
            accuracy_rate: 0.0,
            retrievability: 0.0,
            next_review_at: None,
        }
    }

    pub fn from_progress(word_id: WordId, progress: &WordProgress) -> Self {
        Self {
            word_id,
            state: Some(progress.state),
            is_learned: progress.is_learned(),
            is_due: progress.is_due,
            total_reviews: progress.total_reviews,
            correct_reviews: progress.correct_reviews,
            accuracy_rate: progress.accuracy_rate,
            retrievability: progress.retrievability,
            next_review_at: Some(progress.next_review_at),
        }
    }
}

/// A word together with the learner's snapshot for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordWithProgress {
    pub word: Word,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    pub is_learned: bool,
    pub is_due_for_review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
}

impl WordWithProgress {
    /// Entry for a word with no card yet.
    pub fn new_word(word: Word) -> Self {
        Self {
            word,
            card: None,
            is_learned: false,
            is_due_for_review: false,
            next_review_at: None,
        }
    }

    pub fn with_progress(word: Word, card: Card, progress: &WordProgress) -> Self {
        Self {
            word,
            card: Some(card),
            is_learned: progress.is_learned(),
            is_due_for_review: progress.is_due,
            next_review_at: Some(progress.next_review_at),
        }
    }
}

/// Per (user, lesson) completion counters.
///
/// `words_to_review` counts words that have a card but are not learned yet
/// (reviewed minus learned).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub total_words: i64,
    pub words_learned: i64,
    pub words_to_review: i64,
    pub is_started: bool,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl LessonProgress {
    /// Snapshot for a lesson the user has not started.
    pub fn zeroed(
        user_id: UserId,
        lesson_id: LessonId,
        total_words: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            lesson_id,
            total_words,
            words_learned: 0,
            words_to_review: 0,
            is_started: false,
            is_completed: false,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// Learned share of the lesson, 0-100.
    pub fn percentage(&self) -> f64 {
        if self.total_words <= 0 {
            return 0.0;
        }
        (self.words_learned as f64 / self.total_words as f64 * 100.0).min(100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    /// Only words the user has never rated
    NewLesson,
    /// Only words that already have a card
    ReviewOld,
    Mixed,
}

impl SessionType {
    pub fn classify(new_words: usize, words_to_review: usize) -> Self {
        match (new_words, words_to_review) {
            (n, 0) if n > 0 => SessionType::NewLesson,
            (0, r) if r > 0 => SessionType::ReviewOld,
            _ => SessionType::Mixed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::NewLesson => "new_lesson",
            SessionType::ReviewOld => "review_old",
            SessionType::Mixed => "mixed",
        }
    }
}

/// A lesson's words partitioned for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSession {
    pub lesson_id: LessonId,
    pub new_words: Vec<WordWithProgress>,
    pub words_to_review: Vec<WordWithProgress>,
    pub total_words: usize,
    pub session_type: SessionType,
}

/// Overall numbers for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total_lessons: i64,
    pub completed_lessons: i64,
    pub total_words: i64,
    pub words_due_for_review: i64,
}

/// Daily activity used for streaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActivity {
    pub user_id: UserId,
    pub current_streak: i64,
    pub longest_streak: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_date: Option<NaiveDate>,
}

impl UserActivity {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            current_streak: 0,
            longest_streak: 0,
            last_active_date: None,
        }
    }
}
