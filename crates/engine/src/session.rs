//! Review session composition.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use wordcards_core::{
    Card, Curriculum, Error, LessonId, Result, ReviewSession, SessionType, UserId, WordId,
    WordWithProgress,
};

use crate::scheduling::SchedulingEngine;

/// Splits a lesson into words the learner has never seen and words that
/// already have a card, both in the lesson's own order.
pub struct ReviewSessionBuilder {
    engine: Arc<SchedulingEngine>,
    curriculum: Arc<dyn Curriculum>,
}

impl ReviewSessionBuilder {
    pub fn new(engine: Arc<SchedulingEngine>, curriculum: Arc<dyn Curriculum>) -> Self {
        Self { engine, curriculum }
    }

    pub async fn build_session(
        &self,
        user: UserId,
        lesson: LessonId,
        now: DateTime<Utc>,
    ) -> Result<ReviewSession> {
        let words = self
            .curriculum
            .lesson_words(user, lesson)
            .await?
            .ok_or_else(|| Error::not_found("lesson", lesson))?;

        let word_ids: Vec<WordId> = words.iter().map(|w| w.id).collect();
        let mut cards: HashMap<WordId, Card> = self
            .engine
            .cards()
            .cards_for_words(user, &word_ids)
            .await?
            .into_iter()
            .map(|card| (card.word_id, card))
            .collect();

        let total_words = words.len();
        let mut new_words = Vec::new();
        let mut words_to_review = Vec::new();
        for word in words {
            match cards.remove(&word.id) {
                Some(card) => {
                    let progress = self.engine.progress(&card, now)?;
                    words_to_review.push(WordWithProgress::with_progress(word, card, &progress));
                }
                None => new_words.push(WordWithProgress::new_word(word)),
            }
        }

        let session_type = SessionType::classify(new_words.len(), words_to_review.len());
        debug!(
            user_id = user,
            lesson_id = lesson,
            new = new_words.len(),
            review = words_to_review.len(),
            session_type = session_type.as_str(),
            "Built review session"
        );
        Ok(ReviewSession {
            lesson_id: lesson,
            new_words,
            words_to_review,
            total_words,
            session_type,
        })
    }
}
