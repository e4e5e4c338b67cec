//! Lesson progress aggregation.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};
use wordcards_core::{
    CardStore, Curriculum, Error, LessonId, LessonProgress, MemoryModel, ProgressStore, Result,
    UserId, WordId,
};

/// Derives a lesson's counters from the cards of its words.
///
/// `words_learned` counts cards whose stage is Review or later;
/// `words_to_review` counts cards that exist but are not yet learned.
pub struct LessonProgressAggregator {
    model: Arc<dyn MemoryModel>,
    cards: Arc<dyn CardStore>,
    progress: Arc<dyn ProgressStore>,
    curriculum: Arc<dyn Curriculum>,
}

impl LessonProgressAggregator {
    pub fn new(
        model: Arc<dyn MemoryModel>,
        cards: Arc<dyn CardStore>,
        progress: Arc<dyn ProgressStore>,
        curriculum: Arc<dyn Curriculum>,
    ) -> Self {
        Self {
            model,
            cards,
            progress,
            curriculum,
        }
    }

    /// Recount the lesson and persist the result.
    ///
    /// The first call starts the lesson. Completion is set once, the first
    /// time every word is learned, and is never cleared. A lesson without
    /// words is left untouched.
    pub async fn recompute(
        &self,
        user: UserId,
        lesson: LessonId,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress> {
        let words = self
            .curriculum
            .lesson_words(user, lesson)
            .await?
            .ok_or_else(|| Error::not_found("lesson", lesson))?;
        let existing = self.progress.get_progress(user, lesson).await?;

        if words.is_empty() {
            debug!(
                user_id = user,
                lesson_id = lesson,
                "Lesson has no words; nothing to record"
            );
            return Ok(match existing {
                Some(progress) => progress,
                None => LessonProgress::zeroed(user, lesson, 0, now),
            });
        }

        let word_ids: Vec<WordId> = words.iter().map(|w| w.id).collect();
        let cards = self.cards.cards_for_words(user, &word_ids).await?;

        let mut learned = 0_i64;
        for card in &cards {
            let stage = self.model.stage(&card.memory_state).map_err(|e| {
                error!(card_id = card.id, "Cannot classify card: {e}");
                Error::Scheduling(e)
            })?;
            if stage.is_learned() {
                learned += 1;
            }
        }
        let reviewed = cards.len() as i64;
        let total = words.len() as i64;

        let mut next = match existing {
            Some(progress) => progress,
            None => LessonProgress::zeroed(user, lesson, total, now),
        };
        next.total_words = total;
        next.words_learned = learned;
        next.words_to_review = reviewed - learned;
        next.updated_at = now;
        next.is_started = true;
        next.started_at.get_or_insert(now);
        if !next.is_completed && learned >= total {
            next.is_completed = true;
            next.completed_at = Some(now);
            info!(user_id = user, lesson_id = lesson, "Lesson completed");
        }

        let stored = self.progress.upsert_progress(&next).await?;
        debug!(
            user_id = user,
            lesson_id = lesson,
            learned = stored.words_learned,
            total = stored.total_words,
            "Lesson progress recomputed"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::{ReviewContext, SchedulingEngine};
    use crate::test_support::{StepModel, seeded_store};
    use chrono::Duration;
    use wordcards_core::Rating;
    use wordcards_store::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        engine: SchedulingEngine,
        aggregator: LessonProgressAggregator,
    }

    fn fixture(store: Arc<InMemoryStore>) -> Fixture {
        let model: Arc<dyn MemoryModel> = Arc::new(StepModel);
        Fixture {
            engine: SchedulingEngine::new(model.clone(), store.clone()),
            aggregator: LessonProgressAggregator::new(
                model,
                store.clone(),
                store.clone(),
                store.clone(),
            ),
            store,
        }
    }

    async fn rate(fx: &Fixture, word: WordId, rating: Rating, now: DateTime<Utc>) {
        let card = fx.engine.get_or_create_card(1, word, now).await.unwrap();
        fx.engine
            .review_card(card, rating, now, ReviewContext::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_recompute_starts_lesson() {
        let (store, lesson, _) = seeded_store(2).await;
        let fx = fixture(store);
        let now = Utc::now();
        let progress = fx.aggregator.recompute(1, lesson.id, now).await.unwrap();
        assert!(progress.is_started);
        assert_eq!(progress.started_at, Some(now));
        assert_eq!(progress.total_words, 2);
        assert_eq!(progress.words_learned, 0);
        assert!(!progress.is_completed);
    }

    #[tokio::test]
    async fn test_counts_learned_and_to_review() {
        let (store, lesson, words) = seeded_store(3).await;
        let fx = fixture(store);
        let now = Utc::now();
        rate(&fx, words[0].id, Rating::Good, now).await;
        rate(&fx, words[1].id, Rating::Again, now).await;

        let progress = fx.aggregator.recompute(1, lesson.id, now).await.unwrap();
        assert_eq!(progress.words_learned, 1);
        assert_eq!(progress.words_to_review, 1);
        assert_eq!(progress.total_words, 3);
    }

    #[tokio::test]
    async fn test_completion_is_stamped_once() {
        let (store, lesson, words) = seeded_store(1).await;
        let fx = fixture(store);
        let t0 = Utc::now();
        rate(&fx, words[0].id, Rating::Easy, t0).await;
        let done = fx.aggregator.recompute(1, lesson.id, t0).await.unwrap();
        assert!(done.is_completed);
        assert_eq!(done.completed_at, Some(t0));

        let later = fx.aggregator
            .recompute(1, lesson.id, t0 + Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(later.completed_at, Some(t0));
        assert_eq!(later.started_at, Some(t0));
    }

    #[tokio::test]
    async fn test_completion_survives_word_deletion_and_regression() {
        let (store, lesson, words) = seeded_store(2).await;
        let fx = fixture(store);
        let now = Utc::now();
        rate(&fx, words[0].id, Rating::Good, now).await;
        rate(&fx, words[1].id, Rating::Good, now).await;
        let progress = fx.aggregator.recompute(1, lesson.id, now).await.unwrap();
        assert!(progress.is_completed);

        // A learned word is removed and the remaining one lapses.
        assert!(fx.store.delete_word(words[0].id).await);
        rate(&fx, words[1].id, Rating::Again, now).await;

        let progress = fx.aggregator.recompute(1, lesson.id, now).await.unwrap();
        assert_eq!(progress.total_words, 1);
        assert_eq!(progress.words_learned, 0);
        assert!(progress.is_completed);
        assert_eq!(progress.completed_at, Some(now));
    }

    #[tokio::test]
    async fn test_empty_lesson_is_never_completed_or_persisted() {
        let (store, lesson, _) = seeded_store(0).await;
        let fx = fixture(store);
        let progress = fx.aggregator
            .recompute(1, lesson.id, Utc::now())
            .await
            .unwrap();
        assert!(!progress.is_completed);
        assert!(!progress.is_started);
        let stored = fx.store.get_progress(1, lesson.id).await.unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_foreign_lesson_is_not_found() {
        let (store, lesson, _) = seeded_store(1).await;
        let fx = fixture(store);
        let err = fx.aggregator
            .recompute(2, lesson.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "lesson", .. }));
    }
}
