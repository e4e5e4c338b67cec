//! Persistence traits for cards, reviews, lesson progress and activity.
//!
//! Implementations: SQLite, in-memory (for testing).

use async_trait::async_trait;

use crate::card::{
    Card, CardId, CardUpdate, MemoryState, NewCard, NewReview, Review, UserId, WordId,
};
use crate::curriculum::LessonId;
use crate::error::StoreError;
use crate::progress::{LessonProgress, UserActivity};

/// Cards plus the append-only review log.
///
/// The two live behind one trait because a review must advance the card
/// and append the log entry atomically.
#[async_trait]
pub trait CardStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Fetch the card for a (user, word) pair.
    async fn get_card(&self, user: UserId, word: WordId) -> Result<Option<Card>, StoreError>;

    /// Fetch a card by id.
    async fn get_card_by_id(&self, id: CardId) -> Result<Option<Card>, StoreError>;

    /// Insert a new card.
    ///
    /// Fails with `StoreError::Conflict` if a card already exists for the
    /// pair; callers refetch the existing row.
    async fn insert_card(&self, card: NewCard) -> Result<Card, StoreError>;

    /// All cards of a user.
    async fn cards_for_user(&self, user: UserId) -> Result<Vec<Card>, StoreError>;

    /// Cards of a user restricted to `words`, in one round trip.
    async fn cards_for_words(&self, user: UserId, words: &[WordId])
    -> Result<Vec<Card>, StoreError>;

    /// Apply a card update and append a review as one atomic unit.
    ///
    /// Fails with `StoreError::Conflict`, writing nothing, when the card's
    /// `total_reviews` no longer equals `update.expected_total_reviews`.
    async fn commit_review(
        &self,
        update: CardUpdate,
        review: NewReview,
    ) -> Result<(Card, Review), StoreError>;

    /// A card's reviews in the order they were committed.
    ///
    /// Commit order is the order the card's state was advanced in, which
    /// can differ from `reviewed_at` order when callers pass their own clock.
    async fn reviews_for_card(&self, card: CardId) -> Result<Vec<Review>, StoreError>;

    /// Overwrite a card's cached memory state (used after replaying the log).
    ///
    /// Fails with `StoreError::Conflict`, writing nothing, when the card's
    /// `total_reviews` no longer equals `expected_total_reviews`.
    async fn replace_memory_state(
        &self,
        card: CardId,
        expected_total_reviews: i64,
        state: &MemoryState,
    ) -> Result<Card, StoreError>;
}

/// Lesson progress rows.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<LessonProgress>, StoreError>;

    /// Insert or update the row for `(progress.user_id, progress.lesson_id)`.
    ///
    /// Completion is sticky: an update never clears `is_completed` or
    /// replaces an existing `completed_at`, and `started_at` is kept once
    /// set. Returns the row as stored.
    async fn upsert_progress(&self, progress: &LessonProgress)
    -> Result<LessonProgress, StoreError>;

    async fn progress_for_user(&self, user: UserId) -> Result<Vec<LessonProgress>, StoreError>;
}

/// Daily activity rows.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn get_activity(&self, user: UserId) -> Result<Option<UserActivity>, StoreError>;

    async fn put_activity(&self, activity: &UserActivity) -> Result<(), StoreError>;
}
