//! The service facade an HTTP layer or the CLI talks to.
//!
//! Every operation validates that the referenced word or lesson belongs to
//! the requesting user before touching scheduling state, and each has an
//! `*_at` variant taking the clock reading explicitly.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wordcards_core::{
    ActivityStore, Card, CardStore, Curriculum, Error, LessonId, LessonProgress, MemoryModel,
    ProgressStore, ProgressSummary, Rating, Result, Review, ReviewSession, UserActivity, UserId,
    WordId, WordProgressReport, WordWithProgress,
};

use crate::aggregator::LessonProgressAggregator;
use crate::scheduling::{ReviewContext, SchedulingEngine};
use crate::session::ReviewSessionBuilder;
use crate::streak::StreakTracker;

/// Tunables for [`LearningService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Due list length when the caller gives none
    pub default_due_limit: usize,
    /// Largest due list a caller may ask for
    pub max_due_limit: usize,
    pub max_conflict_retries: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            default_due_limit: 20,
            max_due_limit: 200,
            max_conflict_retries: 3,
        }
    }
}

/// Result of a submitted rating.
#[derive(Debug, Clone, Serialize)]
pub struct RatingOutcome {
    pub card: Card,
    pub review: Review,
    /// Present when the rating was given inside a lesson
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_progress: Option<LessonProgress>,
}

pub struct LearningService {
    engine: Arc<SchedulingEngine>,
    aggregator: LessonProgressAggregator,
    sessions: ReviewSessionBuilder,
    streaks: StreakTracker,
    curriculum: Arc<dyn Curriculum>,
    progress: Arc<dyn ProgressStore>,
    settings: ServiceSettings,
}

impl LearningService {
    /// Build a service over one store that provides every persistence seam.
    pub fn new<S>(model: Arc<dyn MemoryModel>, store: Arc<S>, settings: ServiceSettings) -> Self
    where
        S: CardStore + ProgressStore + Curriculum + ActivityStore + 'static,
    {
        Self::from_parts(
            model,
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            settings,
        )
    }

    pub fn from_parts(
        model: Arc<dyn MemoryModel>,
        cards: Arc<dyn CardStore>,
        progress: Arc<dyn ProgressStore>,
        curriculum: Arc<dyn Curriculum>,
        activity: Arc<dyn ActivityStore>,
        settings: ServiceSettings,
    ) -> Self {
        let engine = Arc::new(
            SchedulingEngine::new(model.clone(), cards.clone())
                .with_max_conflict_retries(settings.max_conflict_retries),
        );
        info!(
            model = model.name(),
            store = cards.name(),
            "Learning service ready"
        );
        Self {
            aggregator: LessonProgressAggregator::new(
                model,
                cards,
                progress.clone(),
                curriculum.clone(),
            ),
            sessions: ReviewSessionBuilder::new(engine.clone(), curriculum.clone()),
            streaks: StreakTracker::new(activity),
            engine,
            curriculum,
            progress,
            settings,
        }
    }

    pub fn engine(&self) -> &SchedulingEngine {
        &self.engine
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub async fn submit_rating(
        &self,
        user: UserId,
        word: WordId,
        rating: Rating,
        lesson: Option<LessonId>,
        response_latency_secs: Option<f64>,
    ) -> Result<RatingOutcome> {
        self.submit_rating_at(
            user,
            word,
            rating,
            lesson,
            response_latency_secs,
            Utc::now(),
        )
        .await
    }

    /// Rate a word, then refresh the lesson's progress and the user's streak.
    pub async fn submit_rating_at(
        &self,
        user: UserId,
        word: WordId,
        rating: Rating,
        lesson: Option<LessonId>,
        response_latency_secs: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<RatingOutcome> {
        if let Some(secs) = response_latency_secs
            && !(secs.is_finite() && secs >= 0.0)
        {
            return Err(Error::Validation(format!(
                "response latency must be a non-negative number of seconds, got {secs}"
            )));
        }
        self.require_word(user, word).await?;
        if let Some(lesson) = lesson {
            self.require_lesson(user, lesson).await?;
        }

        let card = self.engine.get_or_create_card(user, word, now).await?;
        let context = ReviewContext {
            response_latency_secs,
            lesson_id: lesson,
        };
        let (card, review) = self.engine.review_card(card, rating, now, context).await?;

        let lesson_progress = match lesson {
            Some(lesson) => Some(self.aggregator.recompute(user, lesson, now).await?),
            None => None,
        };

        // The review is already committed; a streak failure must not undo it.
        if let Err(e) = self.streaks.record(user, now).await {
            warn!(user_id = user, "Failed to record activity: {e}");
        }

        info!(
            user_id = user,
            word_id = word,
            rating = %rating,
            "Rating submitted"
        );
        Ok(RatingOutcome {
            card,
            review,
            lesson_progress,
        })
    }

    pub async fn get_due_words(
        &self,
        user: UserId,
        limit: Option<usize>,
    ) -> Result<Vec<WordWithProgress>> {
        self.get_due_words_at(user, limit, Utc::now()).await
    }

    /// Due words, most overdue first.
    ///
    /// Cards whose word is no longer visible are skipped before the limit
    /// applies, so the list is only short when fewer words are due.
    pub async fn get_due_words_at(
        &self,
        user: UserId,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WordWithProgress>> {
        let limit = self.due_limit(limit)?;
        let cards = self.engine.due_cards(user, usize::MAX, now).await?;

        let mut due = Vec::with_capacity(limit.min(cards.len()));
        for card in cards {
            if due.len() == limit {
                break;
            }
            let Some(word) = self.curriculum.word(user, card.word_id).await? else {
                debug!(
                    card_id = card.id,
                    word_id = card.word_id,
                    "Skipping card without a word"
                );
                continue;
            };
            let progress = self.engine.progress(&card, now)?;
            due.push(WordWithProgress::with_progress(word, card, &progress));
        }
        Ok(due)
    }

    pub async fn get_lesson_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<LessonProgress> {
        self.get_lesson_progress_at(user, lesson, Utc::now()).await
    }

    /// The stored progress row, or an unsaved zeroed snapshot.
    pub async fn get_lesson_progress_at(
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
        match self.progress.get_progress(user, lesson).await? {
            Some(progress) => Ok(progress),
            None => {
                let total = words.len() as i64;
                Ok(LessonProgress::zeroed(user, lesson, total, now))
            }
        }
    }

    pub async fn get_review_session(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<ReviewSession> {
        self.get_review_session_at(user, lesson, Utc::now()).await
    }

    pub async fn get_review_session_at(
        &self,
        user: UserId,
        lesson: LessonId,
        now: DateTime<Utc>,
    ) -> Result<ReviewSession> {
        self.sessions.build_session(user, lesson, now).await
    }

    pub async fn get_word_progress(
        &self,
        user: UserId,
        word: WordId,
    ) -> Result<WordProgressReport> {
        self.get_word_progress_at(user, word, Utc::now()).await
    }

    pub async fn get_word_progress_at(
        &self,
        user: UserId,
        word: WordId,
        now: DateTime<Utc>,
    ) -> Result<WordProgressReport> {
        self.require_word(user, word).await?;
        match self.engine.cards().get_card(user, word).await? {
            Some(card) => {
                let progress = self.engine.progress(&card, now)?;
                Ok(WordProgressReport::from_progress(word, &progress))
            }
            None => Ok(WordProgressReport::unreviewed(word)),
        }
    }

    pub async fn start_lesson(&self, user: UserId, lesson: LessonId) -> Result<LessonProgress> {
        self.start_lesson_at(user, lesson, Utc::now()).await
    }

    /// Mark a lesson as started without rating anything.
    pub async fn start_lesson_at(
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
        if let Some(existing) = self.progress.get_progress(user, lesson).await?
            && existing.is_started
        {
            return Ok(existing);
        }

        let mut progress = LessonProgress::zeroed(user, lesson, words.len() as i64, now);
        progress.is_started = true;
        progress.started_at = Some(now);
        let stored = self.progress.upsert_progress(&progress).await?;
        info!(user_id = user, lesson_id = lesson, "Lesson started");
        Ok(stored)
    }

    pub async fn progress_summary(&self, user: UserId) -> Result<ProgressSummary> {
        self.progress_summary_at(user, Utc::now()).await
    }

    pub async fn progress_summary_at(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<ProgressSummary> {
        let lessons = self.progress.progress_for_user(user).await?;
        let cards = self.engine.cards().cards_for_user(user).await?;
        let mut due = 0;
        for card in &cards {
            if self.engine.is_due(card, now)? {
                due += 1;
            }
        }

        Ok(ProgressSummary {
            total_lessons: lessons.len() as i64,
            completed_lessons: lessons.iter().filter(|p| p.is_completed).count() as i64,
            total_words: cards.len() as i64,
            words_due_for_review: due,
        })
    }

    pub async fn streak(&self, user: UserId) -> Result<UserActivity> {
        self.streaks.current(user).await
    }

    pub async fn rebuild_card(&self, user: UserId, word: WordId) -> Result<Card> {
        self.rebuild_card_at(user, word, Utc::now()).await
    }

    /// Recompute a card's memory state from its review log.
    ///
    /// The rebuilt state can move the word in or out of the learned stages,
    /// so a started lesson holding the word has its progress recomputed.
    pub async fn rebuild_card_at(
        &self,
        user: UserId,
        word: WordId,
        now: DateTime<Utc>,
    ) -> Result<Card> {
        let lesson = self
            .curriculum
            .word(user, word)
            .await?
            .ok_or_else(|| Error::not_found("word", word))?
            .lesson_id;
        let card = self
            .engine
            .cards()
            .get_card(user, word)
            .await?
            .ok_or_else(|| Error::not_found("card for word", word))?;
        let rebuilt = self.engine.rebuild_card(&card).await?;
        info!(card_id = rebuilt.id, "Card rebuilt from review log");

        if self.progress.get_progress(user, lesson).await?.is_some() {
            self.aggregator.recompute(user, lesson, now).await?;
        }
        Ok(rebuilt)
    }

    fn due_limit(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.settings.default_due_limit),
            Some(0) => Err(Error::Validation("limit must be at least 1".into())),
            Some(n) if n > self.settings.max_due_limit => Err(Error::Validation(format!(
                "limit must be at most {}, got {n}",
                self.settings.max_due_limit
            ))),
            Some(n) => Ok(n),
        }
    }

    async fn require_word(&self, user: UserId, word: WordId) -> Result<()> {
        self.curriculum
            .word(user, word)
            .await?
            .map(|_| ())
            .ok_or_else(|| Error::not_found("word", word))
    }

    async fn require_lesson(&self, user: UserId, lesson: LessonId) -> Result<()> {
        self.curriculum
            .lesson(user, lesson)
            .await?
            .map(|_| ())
            .ok_or_else(|| Error::not_found("lesson", lesson))
    }
}
