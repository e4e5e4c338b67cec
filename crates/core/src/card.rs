//! Cards, ratings, and the append-only review log.
//!
//! A [`Card`] is the per (user, word) memory record. Its `memory_state` is a
//! cached projection of the review log: replaying every [`Review`] through
//! the memory model from the initial state must reproduce it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchedulingError;

pub type UserId = i64;
pub type WordId = i64;
pub type CardId = i64;
pub type ReviewId = i64;

/// The four ordinal review grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn value(self) -> i64 {
        self as i64
    }

    /// Good and Easy count toward `correct_reviews`; Again and Hard do not.
    pub fn is_correct(self) -> bool {
        matches!(self, Rating::Good | Rating::Easy)
    }
}

impl TryFrom<i64> for Rating {
    type Error = SchedulingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            other => Err(SchedulingError::InvalidRating(other)),
        }
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        rating.value()
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        };
        f.write_str(name)
    }
}

/// Learning stage reported by the memory model.
///
/// Ordered `Learning < Review < Relearning`; a word counts as learned once
/// its card reaches `Review` or later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Learning = 1,
    Review = 2,
    Relearning = 3,
}

impl Stage {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            1 => Some(Stage::Learning),
            2 => Some(Stage::Review),
            3 => Some(Stage::Relearning),
            _ => None,
        }
    }

    pub fn is_learned(self) -> bool {
        self >= Stage::Review
    }
}

/// Opaque memory-model payload.
///
/// The engine never looks inside; only the [`MemoryModel`](crate::MemoryModel)
/// that produced it can interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryState(serde_json::Value);

impl MemoryState {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_json(self) -> serde_json::Value {
        self.0
    }

    /// Serialize for a text column.
    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }

    /// Parse a stored payload. Invalid JSON is a scheduling error, not a
    /// storage one: the row exists but its state cannot be used.
    pub fn from_json_str(raw: &str) -> Result<Self, SchedulingError> {
        serde_json::from_str(raw)
            .map(Self)
            .map_err(|e| SchedulingError::MalformedState(format!("stored payload: {e}")))
    }
}

/// Per (user, word) memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub user_id: UserId,
    pub word_id: WordId,
    pub memory_state: MemoryState,
    pub total_reviews: i64,
    pub correct_reviews: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// `correct_reviews / total_reviews`, or 0 before the first review.
    pub fn accuracy_rate(&self) -> f64 {
        if self.total_reviews <= 0 {
            return 0.0;
        }
        (self.correct_reviews as f64 / self.total_reviews as f64).clamp(0.0, 1.0)
    }
}

/// A card row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub user_id: UserId,
    pub word_id: WordId,
    pub memory_state: MemoryState,
    pub created_at: DateTime<Utc>,
}

/// The card half of an atomic review commit.
///
/// `expected_total_reviews` is the version the update was computed from;
/// stores reject the commit with `StoreError::Conflict` if it moved.
#[derive(Debug, Clone)]
pub struct CardUpdate {
    pub card_id: CardId,
    pub expected_total_reviews: i64,
    pub memory_state: MemoryState,
    pub total_reviews: i64,
    pub correct_reviews: i64,
    pub last_reviewed_at: DateTime<Utc>,
}

/// The review half of an atomic review commit.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
    pub response_latency_secs: Option<f64>,
    pub lesson_id: Option<i64>,
    pub scheduled_days: Option<i64>,
    pub elapsed_days: Option<i64>,
    pub lapses: Option<i64>,
}

/// One immutable rating event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub card_id: CardId,
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_latency_secs: Option<f64>,
    /// Lesson the review happened in, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lapses: Option<i64>,
}

impl Review {
    pub fn from_new(id: ReviewId, card_id: CardId, new: NewReview) -> Self {
        Self {
            id,
            card_id,
            rating: new.rating,
            reviewed_at: new.reviewed_at,
            response_latency_secs: new.response_latency_secs,
            lesson_id: new.lesson_id,
            scheduled_days: new.scheduled_days,
            elapsed_days: new.elapsed_days,
            lapses: new.lapses,
        }
    }
}
