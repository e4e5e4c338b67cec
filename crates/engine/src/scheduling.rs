//! The scheduling engine: card lifecycle, reviews and due queries.
//!
//! Cards and reviews are only ever written from here. A review applies the
//! memory model to the card's cached state and commits the new state and
//! the review log entry in one atomic store call, guarded by the card's
//! `total_reviews` version.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};
use wordcards_core::{
    Card, CardId, CardStore, CardUpdate, Error, LessonId, MemoryModel, MemoryState, NewCard,
    NewReview, Rating, Result, Review, SchedulingError, StoreError, UserId, WordId, WordProgress,
};

/// Optional context recorded alongside a review.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewContext {
    pub response_latency_secs: Option<f64>,
    /// Lesson the review happened in
    pub lesson_id: Option<LessonId>,
}

impl ReviewContext {
    pub fn in_lesson(lesson: LessonId) -> Self {
        Self {
            lesson_id: Some(lesson),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, secs: Option<f64>) -> Self {
        self.response_latency_secs = secs;
        self
    }
}

/// Orchestrates the memory model and the card store.
pub struct SchedulingEngine {
    model: Arc<dyn MemoryModel>,
    cards: Arc<dyn CardStore>,

    /// How many times a review that lost a race is re-applied
    max_conflict_retries: u32,
}

impl SchedulingEngine {
    pub fn new(model: Arc<dyn MemoryModel>, cards: Arc<dyn CardStore>) -> Self {
        Self {
            model,
            cards,
            max_conflict_retries: 3,
        }
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn model(&self) -> &dyn MemoryModel {
        self.model.as_ref()
    }

    pub fn cards(&self) -> &dyn CardStore {
        self.cards.as_ref()
    }

    /// Return the user's card for `word`, creating it on first use.
    ///
    /// Safe under concurrent calls: the store's uniqueness constraint picks
    /// one winner and every loser refetches the winning row.
    pub async fn get_or_create_card(
        &self,
        user: UserId,
        word: WordId,
        now: DateTime<Utc>,
    ) -> Result<Card> {
        if let Some(card) = self.cards.get_card(user, word).await? {
            return Ok(card);
        }

        let memory_state = self
            .model
            .initial_state(now)
            .map_err(|e| self.scheduling_failure(None, e))?;
        let new_card = NewCard {
            user_id: user,
            word_id: word,
            memory_state,
            created_at: now,
        };

        match self.cards.insert_card(new_card).await {
            Ok(card) => {
                debug!(
                    card_id = card.id,
                    user_id = user,
                    word_id = word,
                    "Created card"
                );
                Ok(card)
            }
            Err(StoreError::Conflict(reason)) => {
                warn!(
                    user_id = user,
                    word_id = word,
                    "Card creation raced: {reason}"
                );
                self.cards.get_card(user, word).await?.ok_or_else(|| {
                    Error::Store(StoreError::Conflict(format!(
                        "card for user {user} word {word} conflicted but cannot be found"
                    )))
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `rating` to `card` and persist the result.
    ///
    /// If another review of the same card commits first, the card is
    /// reloaded and the rating re-applied to the fresh state, up to
    /// `max_conflict_retries` times.
    pub async fn review_card(
        &self,
        card: Card,
        rating: Rating,
        now: DateTime<Utc>,
        context: ReviewContext,
    ) -> Result<(Card, Review)> {
        let mut card = card;
        let mut attempt = 0;
        loop {
            let transition = self
                .model
                .advance(
                    &card.memory_state,
                    rating,
                    now,
                    context.response_latency_secs,
                )
                .map_err(|e| self.scheduling_failure(Some(card.id), e))?;

            let update = CardUpdate {
                card_id: card.id,
                expected_total_reviews: card.total_reviews,
                memory_state: transition.state,
                total_reviews: card.total_reviews + 1,
                correct_reviews: card.correct_reviews + i64::from(rating.is_correct()),
                last_reviewed_at: now,
            };
            let review = NewReview {
                rating,
                reviewed_at: now,
                response_latency_secs: context.response_latency_secs,
                lesson_id: context.lesson_id,
                scheduled_days: transition.log.scheduled_days,
                elapsed_days: transition.log.elapsed_days,
                lapses: transition.log.lapses,
            };

            match self.cards.commit_review(update, review).await {
                Ok((card, review)) => {
                    debug!(
                        card_id = card.id,
                        rating = %rating,
                        total_reviews = card.total_reviews,
                        "Review committed"
                    );
                    return Ok((card, review));
                }
                Err(StoreError::Conflict(reason)) if attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        card_id = card.id,
                        attempt,
                        "Review lost a race, retrying: {reason}"
                    );
                    card = self
                        .cards
                        .get_card_by_id(card.id)
                        .await?
                        .ok_or_else(|| Error::not_found("card", card.id))?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn is_due(&self, card: &Card, now: DateTime<Utc>) -> Result<bool> {
        self.model
            .is_due(&card.memory_state, now)
            .map_err(|e| self.scheduling_failure(Some(card.id), e))
    }

    /// Due cards of `user`, most overdue first, at most `limit` of them.
    pub async fn due_cards(
        &self,
        user: UserId,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Card>> {
        let mut due = Vec::new();
        for card in self.cards.cards_for_user(user).await? {
            if !self.is_due(&card, now)? {
                continue;
            }
            let due_at = self
                .model
                .due_at(&card.memory_state)
                .map_err(|e| self.scheduling_failure(Some(card.id), e))?;
            due.push((due_at, card));
        }

        due.sort_by(|(a, x), (b, y)| a.cmp(b).then(x.id.cmp(&y.id)));
        due.truncate(limit);
        debug!(user_id = user, count = due.len(), "Collected due cards");
        Ok(due.into_iter().map(|(_, card)| card).collect())
    }

    /// Read-only projection of a card's counters and model-derived state.
    pub fn progress(&self, card: &Card, now: DateTime<Utc>) -> Result<WordProgress> {
        let fail = |e| self.scheduling_failure(Some(card.id), e);
        let state = self.model.stage(&card.memory_state).map_err(fail)?;
        let next_review_at = self.model.due_at(&card.memory_state).map_err(fail)?;
        let is_due = self.model.is_due(&card.memory_state, now).map_err(fail)?;
        let retrievability = self
            .model
            .retrievability(&card.memory_state, now)
            .map_err(fail)?;

        Ok(WordProgress {
            state,
            is_due,
            next_review_at,
            total_reviews: card.total_reviews,
            correct_reviews: card.correct_reviews,
            accuracy_rate: card.accuracy_rate(),
            retrievability: retrievability.clamp(0.0, 1.0),
        })
    }

    /// Rebuild a card's memory state from its review log.
    pub async fn replay(&self, card: &Card) -> Result<MemoryState> {
        Ok(self.replay_log(card).await?.0)
    }

    /// Replay the log, returning the state and how many reviews it covers.
    async fn replay_log(&self, card: &Card) -> Result<(MemoryState, i64)> {
        let reviews = self.cards.reviews_for_card(card.id).await?;
        let mut state = self
            .model
            .initial_state(card.created_at)
            .map_err(|e| self.scheduling_failure(Some(card.id), e))?;
        for review in &reviews {
            state = self
                .model
                .advance(
                    &state,
                    review.rating,
                    review.reviewed_at,
                    review.response_latency_secs,
                )
                .map_err(|e| self.scheduling_failure(Some(card.id), e))?
                .state;
        }
        debug!(
            card_id = card.id,
            reviews = reviews.len(),
            "Replayed review log"
        );
        let replayed = i64::try_from(reviews.len()).unwrap_or(i64::MAX);
        Ok((state, replayed))
    }

    /// Replay the log and store the result as the card's cached state.
    ///
    /// The write only lands if no review committed since the log was read;
    /// otherwise the replay starts over, up to `max_conflict_retries` times.
    pub async fn rebuild_card(&self, card: &Card) -> Result<Card> {
        let mut attempt = 0;
        loop {
            let (state, replayed) = self.replay_log(card).await?;
            match self
                .cards
                .replace_memory_state(card.id, replayed, &state)
                .await
            {
                Ok(card) => return Ok(card),
                Err(StoreError::Conflict(reason)) if attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        card_id = card.id,
                        attempt,
                        "Rebuild raced a review, retrying: {reason}"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn scheduling_failure(&self, card: Option<CardId>, err: SchedulingError) -> Error {
        error!(
            card_id = ?card,
            model = self.model.name(),
            "Scheduling failed: {err}"
        );
        Error::Scheduling(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedStore, StepModel, seeded_store};
    use chrono::Duration;
    use std::sync::atomic::Ordering;
    use wordcards_store::{InMemoryStore, SqliteStore};

    fn engine(store: Arc<dyn CardStore>) -> SchedulingEngine {
        SchedulingEngine::new(Arc::new(StepModel), store)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (store, _, words) = seeded_store(1).await;
        let engine = engine(store);
        let now = Utc::now();
        let first = engine
            .get_or_create_card(1, words[0].id, now)
            .await
            .unwrap();
        let second = engine
            .get_or_create_card(1, words[0].id, now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total_reviews, 0);
        assert_eq!(
            engine.model().stage(&first.memory_state).unwrap(),
            wordcards_core::Stage::Learning
        );
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_yields_one_card() {
        let (store, _, words) = seeded_store(1).await;
        let engine = Arc::new(engine(store.clone()));
        let word = words[0].id;
        let now = Utc::now();

        let calls = (0..16).map(|_| {
            let engine = Arc::clone(&engine);
            async move { engine.get_or_create_card(1, word, now).await }
        });
        let cards: Vec<Card> = futures::future::join_all(calls)
            .await
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();

        assert!(cards.iter().all(|c| c.id == cards[0].id));
        assert_eq!(store.cards_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_over_sqlite() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let course = store
            .create_course(
                1,
                wordcards_core::NewCourse {
                    title: "German".into(),
                    description: None,
                    language: "de".into(),
                    native_language: "en".into(),
                },
            )
            .await
            .unwrap();
        let lesson = store
            .create_lesson(
                course.id,
                wordcards_core::NewLesson {
                    title: "Numbers".into(),
                    description: None,
                    order_index: 0,
                },
            )
            .await
            .unwrap();
        let word = store
            .create_word(lesson.id, wordcards_core::NewWord::new("eins", "one", 0))
            .await
            .unwrap();

        let engine = Arc::new(engine(store.clone()));
        let now = Utc::now();
        let calls = (0..8).map(|_| {
            let engine = Arc::clone(&engine);
            async move { engine.get_or_create_card(1, word.id, now).await }
        });
        let results = futures::future::join_all(calls).await;
        let ids: Vec<CardId> = results.into_iter().map(|r| r.unwrap().id).collect();
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(store.cards_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_conflict_refetches_winner() {
        let (inner, _, words) = seeded_store(1).await;
        let scripted = Arc::new(ScriptedStore::new(inner.clone()));
        let engine = engine(scripted.clone());
        let now = Utc::now();

        let existing = engine
            .get_or_create_card(1, words[0].id, now)
            .await
            .unwrap();
        scripted.hide_next_lookup.store(true, Ordering::SeqCst);
        let again = engine
            .get_or_create_card(1, words[0].id, now)
            .await
            .unwrap();

        assert_eq!(again.id, existing.id);
        assert_eq!(inner.cards_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_review_updates_counters_and_log() {
        let (store, lesson, words) = seeded_store(1).await;
        let engine = engine(store.clone());
        let now = Utc::now();
        let card = engine
            .get_or_create_card(1, words[0].id, now)
            .await
            .unwrap();

        let context = ReviewContext::in_lesson(lesson.id).with_latency(Some(3.0));
        let (card, review) = engine
            .review_card(card, Rating::Good, now, context)
            .await
            .unwrap();
        assert_eq!((card.total_reviews, card.correct_reviews), (1, 1));
        assert_eq!(card.last_reviewed_at, Some(now));
        assert_eq!(review.lesson_id, Some(lesson.id));
        assert_eq!(review.scheduled_days, Some(1));

        let (card, _) = engine
            .review_card(card, Rating::Hard, now, ReviewContext::default())
            .await
            .unwrap();
        assert_eq!((card.total_reviews, card.correct_reviews), (2, 1));
        assert_eq!(store.reviews_for_card(card.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_review_write_changes_nothing() {
        let (store, _, words) = seeded_store(1).await;
        let engine = engine(store.clone());
        let now = Utc::now();
        let card = engine
            .get_or_create_card(1, words[0].id, now)
            .await
            .unwrap();

        store.fail_review_writes(true);
        let err = engine
            .review_card(card.clone(), Rating::Easy, now, ReviewContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Storage(_))));

        let after = store.get_card_by_id(card.id).await.unwrap().unwrap();
        assert_eq!(after.memory_state, card.memory_state);
        assert_eq!(after.total_reviews, 0);
        assert!(store.reviews_for_card(card.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_retries_after_losing_race() {
        let (inner, _, words) = seeded_store(1).await;
        let scripted = Arc::new(ScriptedStore::new(inner.clone()));
        let engine = engine(scripted.clone());
        let now = Utc::now();
        let card = engine
            .get_or_create_card(1, words[0].id, now)
            .await
            .unwrap();

        scripted.conflicts_remaining.store(1, Ordering::SeqCst);
        scripted.race_commits.store(true, Ordering::SeqCst);
        let (card, _) = engine
            .review_card(card, Rating::Good, now, ReviewContext::default())
            .await
            .unwrap();

        // Both the competing review and ours are in the log.
        assert_eq!(card.total_reviews, 2);
        assert_eq!(inner.reviews_for_card(card.id).await.unwrap().len(), 2);
        assert_eq!(scripted.commit_attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_review_gives_up_after_max_retries() {
        let (inner, _, words) = seeded_store(1).await;
        let scripted = Arc::new(ScriptedStore::new(inner.clone()));
        let engine = engine(scripted.clone()).with_max_conflict_retries(2);
        let now = Utc::now();
        let card = engine
            .get_or_create_card(1, words[0].id, now)
            .await
            .unwrap();

        scripted.conflicts_remaining.store(10, Ordering::SeqCst);
        let err = engine
            .review_card(card.clone(), Rating::Good, now, ReviewContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Conflict(_))));
        assert_eq!(scripted.commit_attempts.load(Ordering::SeqCst), 3);
        assert!(inner.reviews_for_card(card.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_state_is_scheduling_error() {
        let (store, _, words) = seeded_store(1).await;
        let engine = engine(store.clone());
        let now = Utc::now();
        let card = engine
            .get_or_create_card(1, words[0].id, now)
            .await
            .unwrap();
        let card = store
            .replace_memory_state(card.id, 0, &MemoryState::new(serde_json::json!("corrupt")))
            .await
            .unwrap();

        let err = engine
            .review_card(card.clone(), Rating::Good, now, ReviewContext::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Scheduling(SchedulingError::MalformedState(_))
        ));
        assert_eq!(err.status_code(), 500);
        assert!(store.reviews_for_card(card.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_due_cards_ordered_by_due_time() {
        let (store, _, words) = seeded_store(3).await;
        let engine = engine(store);
        let t1 = Utc::now() - Duration::hours(3);
        let t2 = t1 + Duration::hours(1);
        let t3 = t2 + Duration::hours(1);

        // Insert out of order: the third word first.
        let c3 = engine.get_or_create_card(1, words[2].id, t3).await.unwrap();
        let c1 = engine.get_or_create_card(1, words[0].id, t1).await.unwrap();
        let c2 = engine.get_or_create_card(1, words[1].id, t2).await.unwrap();

        let now = t3 + Duration::minutes(1);
        let due: Vec<CardId> = engine
            .due_cards(1, 2, now)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(due, vec![c1.id, c2.id]);

        let all = engine.due_cards(1, 10, now).await.unwrap();
        assert_eq!(all.last().map(|c| c.id), Some(c3.id));
        let before = t1 - Duration::minutes(1);
        assert!(engine.due_cards(1, 10, before).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_due_ties_broken_by_card_id() {
        let (store, _, words) = seeded_store(3).await;
        let engine = engine(store);
        let t = Utc::now() - Duration::hours(1);
        let b = engine.get_or_create_card(1, words[1].id, t).await.unwrap();
        let a = engine.get_or_create_card(1, words[0].id, t).await.unwrap();
        let due = engine.due_cards(1, 5, Utc::now()).await.unwrap();
        let expected = if a.id < b.id {
            vec![a.id, b.id]
        } else {
            vec![b.id, a.id]
        };
        assert_eq!(due.iter().map(|c| c.id).collect::<Vec<_>>(), expected);
    }

    #[tokio::test]
    async fn test_progress_projection() {
        let (store, _, words) = seeded_store(1).await;
        let engine = engine(store);
        let now = Utc::now();
        let card = engine
            .get_or_create_card(1, words[0].id, now)
            .await
            .unwrap();

        let fresh = engine.progress(&card, now).unwrap();
        assert_eq!(fresh.accuracy_rate, 0.0);
        assert!(fresh.is_due);
        assert!(!fresh.is_learned());

        let (card, _) = engine
            .review_card(card, Rating::Good, now, ReviewContext::default())
            .await
            .unwrap();
        let (card, _) = engine
            .review_card(card, Rating::Again, now, ReviewContext::default())
            .await
            .unwrap();
        let progress = engine.progress(&card, now).unwrap();
        assert_eq!(progress.accuracy_rate, 0.5);
        assert!((0.0..=1.0).contains(&progress.retrievability));
        assert_eq!(progress.next_review_at, now + Duration::minutes(1));
        assert!(!progress.is_due);
        assert!(engine.is_due(&card, now + Duration::minutes(1)).unwrap());
    }

    #[tokio::test]
    async fn test_replay_reproduces_cached_state() {
        let store = Arc::new(InMemoryStore::new());
        let course = store
            .create_course(
                1,
                wordcards_core::NewCourse {
                    title: "French".into(),
                    description: None,
                    language: "fr".into(),
                    native_language: "en".into(),
                },
            )
            .await;
        let lesson = store
            .create_lesson(
                course.id,
                wordcards_core::NewLesson {
                    title: "Colours".into(),
                    description: None,
                    order_index: 0,
                },
            )
            .await
            .unwrap();
        let word = store
            .create_word(lesson.id, wordcards_core::NewWord::new("rouge", "red", 0))
            .await
            .unwrap();

        let engine = engine(store.clone());
        let t0 = Utc::now();
        let mut card = engine.get_or_create_card(1, word.id, t0).await.unwrap();
        let ratings = [Rating::Good, Rating::Again, Rating::Easy];
        for (i, rating) in ratings.into_iter().enumerate() {
            let at = t0 + Duration::days(i as i64);
            (card, _) = engine
                .review_card(card, rating, at, ReviewContext::default())
                .await
                .unwrap();
        }

        assert_eq!(engine.replay(&card).await.unwrap(), card.memory_state);

        let corrupted = store
            .replace_memory_state(card.id, 3, &MemoryState::new(serde_json::json!({})))
            .await
            .unwrap();
        let rebuilt = engine.rebuild_card(&corrupted).await.unwrap();
        assert_eq!(rebuilt.memory_state, card.memory_state);
    }

    #[tokio::test]
    async fn test_replay_follows_commit_order_not_timestamps() {
        let (store, _, words) = seeded_store(1).await;
        let engine = engine(store.clone());
        let t0 = Utc::now();
        let card = engine.get_or_create_card(1, words[0].id, t0).await.unwrap();

        // The second rating carries an earlier clock reading than the first.
        let (card, _) = engine
            .review_card(
                card,
                Rating::Easy,
                t0 + Duration::days(5),
                ReviewContext::default(),
            )
            .await
            .unwrap();
        let (card, _) = engine
            .review_card(
                card,
                Rating::Again,
                t0 + Duration::days(1),
                ReviewContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            engine.model().stage(&card.memory_state).unwrap(),
            wordcards_core::Stage::Learning
        );

        assert_eq!(engine.replay(&card).await.unwrap(), card.memory_state);
        let rebuilt = engine.rebuild_card(&card).await.unwrap();
        assert_eq!(rebuilt.memory_state, card.memory_state);
    }

    #[tokio::test]
    async fn test_rebuild_retries_when_a_review_lands_mid_replay() {
        let (inner, _, words) = seeded_store(1).await;
        let scripted = Arc::new(ScriptedStore::new(inner.clone()));
        let engine = engine(scripted.clone());
        let t0 = Utc::now();
        let card = engine.get_or_create_card(1, words[0].id, t0).await.unwrap();
        let (card, _) = engine
            .review_card(card, Rating::Good, t0, ReviewContext::default())
            .await
            .unwrap();

        let t1 = t0 + Duration::days(2);
        let transition = StepModel
            .advance(&card.memory_state, Rating::Again, t1, None)
            .unwrap();
        let racing = (
            CardUpdate {
                card_id: card.id,
                expected_total_reviews: 1,
                memory_state: transition.state.clone(),
                total_reviews: 2,
                correct_reviews: card.correct_reviews,
                last_reviewed_at: t1,
            },
            NewReview {
                rating: Rating::Again,
                reviewed_at: t1,
                response_latency_secs: None,
                lesson_id: None,
                scheduled_days: transition.log.scheduled_days,
                elapsed_days: transition.log.elapsed_days,
                lapses: transition.log.lapses,
            },
        );
        *scripted.commit_after_log_read.lock().unwrap() = Some(racing);

        let rebuilt = engine.rebuild_card(&card).await.unwrap();
        assert_eq!(rebuilt.total_reviews, 2);
        assert_eq!(rebuilt.memory_state, transition.state);
        assert_eq!(
            engine.model().stage(&rebuilt.memory_state).unwrap(),
            wordcards_core::Stage::Learning
        );
        let stored = inner.get_card_by_id(card.id).await.unwrap().unwrap();
        assert_eq!(stored.memory_state, transition.state);
    }

    /// Delegates to [`StepModel`] but never reports a card as due.
    struct NeverDue;

    impl MemoryModel for NeverDue {
        fn name(&self) -> &str {
            "never_due"
        }

        fn initial_state(
            &self,
            now: chrono::DateTime<Utc>,
        ) -> std::result::Result<MemoryState, SchedulingError> {
            StepModel.initial_state(now)
        }

        fn advance(
            &self,
            state: &MemoryState,
            rating: Rating,
            now: chrono::DateTime<Utc>,
            latency: Option<f64>,
        ) -> std::result::Result<wordcards_core::Transition, SchedulingError> {
            StepModel.advance(state, rating, now, latency)
        }

        fn retrievability(
            &self,
            state: &MemoryState,
            now: chrono::DateTime<Utc>,
        ) -> std::result::Result<f64, SchedulingError> {
            StepModel.retrievability(state, now)
        }

        fn due_at(
            &self,
            state: &MemoryState,
        ) -> std::result::Result<chrono::DateTime<Utc>, SchedulingError> {
            StepModel.due_at(state)
        }

        fn stage(
            &self,
            state: &MemoryState,
        ) -> std::result::Result<wordcards_core::Stage, SchedulingError> {
            StepModel.stage(state)
        }

        fn is_due(
            &self,
            _state: &MemoryState,
            _now: chrono::DateTime<Utc>,
        ) -> std::result::Result<bool, SchedulingError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_due_checks_defer_to_the_model() {
        let (store, _, words) = seeded_store(1).await;
        let engine = SchedulingEngine::new(Arc::new(NeverDue), store);
        let now = Utc::now();
        let card = engine
            .get_or_create_card(1, words[0].id, now)
            .await
            .unwrap();

        let later = now + Duration::days(30);
        assert!(!engine.is_due(&card, later).unwrap());
        assert!(!engine.progress(&card, later).unwrap().is_due);
        assert!(engine.due_cards(1, 10, later).await.unwrap().is_empty());
    }
}
