//! Shared fixtures for the engine's unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use wordcards_core::{
    Card, CardId, CardStore, CardUpdate, Lesson, MemoryModel, MemoryState, NewCard, NewCourse,
    NewLesson, NewReview, NewWord, Rating, Review, ReviewLogEntry, SchedulingError, Stage,
    StoreError, Transition, UserId, Word, WordId,
};
use wordcards_store::InMemoryStore;

/// A tiny deterministic memory model.
///
/// Again → Learning, due in one minute. Hard keeps the stage, due in ten
/// minutes. Good → Review, due in one day. Easy → Review, due in four days.
pub struct StepModel;

impl StepModel {
    fn decode(state: &MemoryState) -> Result<(Stage, DateTime<Utc>, i64), SchedulingError> {
        let value = state.as_json();
        let stage = value["stage"]
            .as_u64()
            .and_then(|s| u8::try_from(s).ok())
            .and_then(Stage::from_ordinal)
            .ok_or_else(|| SchedulingError::MalformedState("missing stage".into()))?;
        let due = value["due"]
            .as_str()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc))
            .ok_or_else(|| SchedulingError::MalformedState("missing due".into()))?;
        let lapses = value["lapses"].as_i64().unwrap_or(0);
        Ok((stage, due, lapses))
    }

    fn encode(stage: Stage, due: DateTime<Utc>, lapses: i64) -> MemoryState {
        MemoryState::new(json!({
            "stage": stage.ordinal(),
            "due": due.to_rfc3339(),
            "lapses": lapses,
        }))
    }
}

impl MemoryModel for StepModel {
    fn name(&self) -> &str {
        "step"
    }

    fn initial_state(&self, now: DateTime<Utc>) -> Result<MemoryState, SchedulingError> {
        Ok(Self::encode(Stage::Learning, now, 0))
    }

    fn advance(
        &self,
        state: &MemoryState,
        rating: Rating,
        now: DateTime<Utc>,
        _response_latency_secs: Option<f64>,
    ) -> Result<Transition, SchedulingError> {
        let (stage, _, mut lapses) = Self::decode(state)?;
        let (stage, wait) = match rating {
            Rating::Again => {
                if stage.is_learned() {
                    lapses += 1;
                }
                (Stage::Learning, Duration::minutes(1))
            }
            Rating::Hard => (stage, Duration::minutes(10)),
            Rating::Good => (Stage::Review, Duration::days(1)),
            Rating::Easy => (Stage::Review, Duration::days(4)),
        };
        Ok(Transition {
            state: Self::encode(stage, now + wait, lapses),
            log: ReviewLogEntry {
                reviewed_at: now,
                scheduled_days: Some(wait.num_days()),
                elapsed_days: Some(0),
                lapses: Some(lapses),
            },
        })
    }

    fn retrievability(
        &self,
        state: &MemoryState,
        now: DateTime<Utc>,
    ) -> Result<f64, SchedulingError> {
        let (_, due, _) = Self::decode(state)?;
        Ok(if now <= due { 1.0 } else { 0.5 })
    }

    fn due_at(&self, state: &MemoryState) -> Result<DateTime<Utc>, SchedulingError> {
        Ok(Self::decode(state)?.1)
    }

    fn stage(&self, state: &MemoryState) -> Result<Stage, SchedulingError> {
        Ok(Self::decode(state)?.0)
    }
}

/// Seed one course with one lesson holding `words` words for user 1.
pub async fn seeded_store(words: usize) -> (Arc<InMemoryStore>, Lesson, Vec<Word>) {
    let store = Arc::new(InMemoryStore::new());
    let course = store
        .create_course(
            1,
            NewCourse {
                title: "Italian".into(),
                description: None,
                language: "it".into(),
                native_language: "en".into(),
            },
        )
        .await;
    let lesson = store
        .create_lesson(
            course.id,
            NewLesson {
                title: "Food".into(),
                description: None,
                order_index: 0,
            },
        )
        .await
        .unwrap();
    let mut created = Vec::with_capacity(words);
    for i in 0..words {
        let word = store
            .create_word(
                lesson.id,
                NewWord::new(format!("parola{i}"), format!("word{i}"), i as i64),
            )
            .await
            .unwrap();
        created.push(word);
    }
    (store, lesson, created)
}

/// Wraps an [`InMemoryStore`] and injects the races the engine must survive.
pub struct ScriptedStore {
    pub inner: Arc<InMemoryStore>,
    /// Make the next `get_card` report no card even if one exists
    pub hide_next_lookup: AtomicBool,
    /// Reject this many upcoming `commit_review` calls with a conflict,
    /// committing the same review first when `race_commits` is set
    pub conflicts_remaining: AtomicU32,
    pub race_commits: AtomicBool,
    pub commit_attempts: AtomicU32,
    /// Committed right after the next `reviews_for_card` reads the log
    pub commit_after_log_read: Mutex<Option<(CardUpdate, NewReview)>>,
}

impl ScriptedStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            hide_next_lookup: AtomicBool::new(false),
            conflicts_remaining: AtomicU32::new(0),
            race_commits: AtomicBool::new(false),
            commit_attempts: AtomicU32::new(0),
            commit_after_log_read: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CardStore for ScriptedStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn get_card(&self, user: UserId, word: WordId) -> Result<Option<Card>, StoreError> {
        if self.hide_next_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get_card(user, word).await
    }

    async fn get_card_by_id(&self, id: CardId) -> Result<Option<Card>, StoreError> {
        self.inner.get_card_by_id(id).await
    }

    async fn insert_card(&self, card: NewCard) -> Result<Card, StoreError> {
        self.inner.insert_card(card).await
    }

    async fn cards_for_user(&self, user: UserId) -> Result<Vec<Card>, StoreError> {
        self.inner.cards_for_user(user).await
    }

    async fn cards_for_words(
        &self,
        user: UserId,
        words: &[WordId],
    ) -> Result<Vec<Card>, StoreError> {
        self.inner.cards_for_words(user, words).await
    }

    async fn commit_review(
        &self,
        update: CardUpdate,
        review: NewReview,
    ) -> Result<(Card, Review), StoreError> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.conflicts_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts_remaining
                .store(remaining - 1, Ordering::SeqCst);
            if self.race_commits.load(Ordering::SeqCst) {
                // Someone else's rating lands first.
                self.inner
                    .commit_review(update.clone(), review.clone())
                    .await?;
            }
            return Err(StoreError::Conflict("scripted race".into()));
        }
        self.inner.commit_review(update, review).await
    }

    async fn reviews_for_card(&self, card: CardId) -> Result<Vec<Review>, StoreError> {
        let log = self.inner.reviews_for_card(card).await?;
        let pending = self
            .commit_after_log_read
            .lock()
            .map_err(|_| StoreError::Storage("scripted lock poisoned".into()))?
            .take();
        if let Some((update, review)) = pending {
            self.inner.commit_review(update, review).await?;
        }
        Ok(log)
    }

    async fn replace_memory_state(
        &self,
        card: CardId,
        expected_total_reviews: i64,
        state: &MemoryState,
    ) -> Result<Card, StoreError> {
        self.inner
            .replace_memory_state(card, expected_total_reviews, state)
            .await
    }
}
