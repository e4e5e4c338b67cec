//! The FSRS scheduler and its persisted card state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use wordcards_core::{
    MemoryModel, MemoryState, Rating, ReviewLogEntry, SchedulingError, Stage, Transition,
};

use crate::ParameterError;
use crate::algorithm::{self, DIFFICULTY_MAX, DIFFICULTY_MIN};
use crate::parameters::FsrsParameters;

/// The FSRS payload stored in a card's `memory_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsrsCard {
    pub state: Stage,
    /// Index into the learning or relearning steps; `None` in Review
    #[serde(default)]
    pub step: Option<usize>,
    #[serde(default)]
    pub stability: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<f64>,
    pub due: DateTime<Utc>,
    #[serde(default)]
    pub last_review: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reps: i64,
    #[serde(default)]
    pub lapses: i64,
}

impl FsrsCard {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: Stage::Learning,
            step: Some(0),
            stability: None,
            difficulty: None,
            due: now,
            last_review: None,
            reps: 0,
            lapses: 0,
        }
    }

    /// Decode and sanity-check a stored payload.
    pub fn decode(state: &MemoryState) -> Result<Self, SchedulingError> {
        let card: FsrsCard = serde_json::from_value(state.as_json().clone())
            .map_err(|e| SchedulingError::MalformedState(format!("fsrs card: {e}")))?;
        card.check()?;
        Ok(card)
    }

    pub fn encode(&self) -> Result<MemoryState, SchedulingError> {
        serde_json::to_value(self)
            .map(MemoryState::new)
            .map_err(|e| SchedulingError::Rejected(format!("encode fsrs card: {e}")))
    }

    fn check(&self) -> Result<(), SchedulingError> {
        if let Some(s) = self.stability
            && !(s.is_finite() && s > 0.0)
        {
            return Err(SchedulingError::MalformedState(format!("stability {s}")));
        }
        if let Some(d) = self.difficulty
            && !(DIFFICULTY_MIN..=DIFFICULTY_MAX).contains(&d)
        {
            return Err(SchedulingError::MalformedState(format!("difficulty {d}")));
        }
        if self.stability.is_some() != self.difficulty.is_some() {
            return Err(SchedulingError::MalformedState(
                "stability and difficulty must be set together".into(),
            ));
        }
        if self.state != Stage::Learning && self.stability.is_none() {
            return Err(SchedulingError::MalformedState(format!(
                "{:?} card without memory parameters",
                self.state
            )));
        }
        if self.reps < 0 || self.lapses < 0 {
            return Err(SchedulingError::MalformedState("negative counters".into()));
        }
        Ok(())
    }
}

/// FSRS implementation of [`MemoryModel`].
#[derive(Debug, Clone)]
pub struct FsrsScheduler {
    params: FsrsParameters,
}

impl Default for FsrsScheduler {
    fn default() -> Self {
        Self {
            params: FsrsParameters::default(),
        }
    }
}

impl FsrsScheduler {
    pub fn new(params: FsrsParameters) -> Result<Self, ParameterError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn parameters(&self) -> &FsrsParameters {
        &self.params
    }

    fn card_retrievability(&self, card: &FsrsCard, now: DateTime<Utc>) -> f64 {
        match (card.last_review, card.stability) {
            (Some(last), Some(stability)) => {
                let elapsed = (now - last).num_days().max(0) as f64;
                algorithm::retrievability(elapsed, stability)
            }
            _ => 0.0,
        }
    }

    /// Whole-day interval for the given stability.
    fn next_interval(&self, stability: f64) -> i64 {
        let days = algorithm::interval_days(stability, self.params.desired_retention).round();
        (days as i64).clamp(1, self.params.maximum_interval_days)
    }

    /// Move through a list of same-day steps.
    ///
    /// Returns the next stage, step index, and wait before the card is due.
    fn step_transition(
        &self,
        stage: Stage,
        steps: &[Duration],
        step: usize,
        rating: Rating,
        stability: f64,
    ) -> (Stage, Option<usize>, Duration) {
        let graduate = || {
            (
                Stage::Review,
                None,
                Duration::days(self.next_interval(stability)),
            )
        };

        if steps.is_empty() || (step >= steps.len() && rating != Rating::Again) {
            return graduate();
        }

        match rating {
            Rating::Again => (stage, Some(0), steps[0]),
            Rating::Hard => {
                let wait = match (step, steps.len()) {
                    (0, 1) => steps[0] * 3 / 2,
                    (0, _) => (steps[0] + steps[1]) / 2,
                    (s, _) => steps[s],
                };
                (stage, Some(step), wait)
            }
            Rating::Good => {
                if step + 1 >= steps.len() {
                    graduate()
                } else {
                    (stage, Some(step + 1), steps[step + 1])
                }
            }
            Rating::Easy => graduate(),
        }
    }

    /// Apply one rating to a decoded card.
    pub fn review(
        &self,
        card: &FsrsCard,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> (FsrsCard, ReviewLogEntry) {
        let w = &self.params.weights;
        let days_since_last = card.last_review.map(|last| (now - last).num_days().max(0));
        let retrievability = self.card_retrievability(card, now);

        let (stability, difficulty) = match (card.stability, card.difficulty) {
            (Some(s), Some(d)) => {
                let stability = if days_since_last.is_some_and(|days| days < 1) {
                    algorithm::short_term_stability(w, s, rating)
                } else {
                    algorithm::next_stability(w, d, s, retrievability, rating)
                };
                (stability, algorithm::next_difficulty(w, d, rating))
            }
            _ => (
                algorithm::initial_stability(w, rating),
                algorithm::initial_difficulty(w, rating),
            ),
        };

        let mut lapses = card.lapses;
        let (state, step, wait) = match card.state {
            Stage::Learning => self.step_transition(
                Stage::Learning,
                &self.params.learning_steps,
                card.step.unwrap_or(0),
                rating,
                stability,
            ),
            Stage::Review => {
                if rating == Rating::Again {
                    lapses += 1;
                    match self.params.relearning_steps.first() {
                        Some(first) => (Stage::Relearning, Some(0), *first),
                        None => (
                            Stage::Review,
                            None,
                            Duration::days(self.next_interval(stability)),
                        ),
                    }
                } else {
                    (
                        Stage::Review,
                        None,
                        Duration::days(self.next_interval(stability)),
                    )
                }
            }
            Stage::Relearning => self.step_transition(
                Stage::Relearning,
                &self.params.relearning_steps,
                card.step.unwrap_or(0),
                rating,
                stability,
            ),
        };

        let next = FsrsCard {
            state,
            step,
            stability: Some(stability),
            difficulty: Some(difficulty),
            due: now + wait,
            last_review: Some(now),
            reps: card.reps + 1,
            lapses,
        };

        debug!(
            from = ?card.state,
            to = ?next.state,
            %rating,
            stability,
            difficulty,
            "fsrs review"
        );

        let log = ReviewLogEntry {
            reviewed_at: now,
            scheduled_days: Some(wait.num_days()),
            elapsed_days: Some(days_since_last.unwrap_or(0)),
            lapses: Some(lapses),
        };
        (next, log)
    }
}

impl MemoryModel for FsrsScheduler {
    fn name(&self) -> &str {
        "fsrs"
    }

    fn initial_state(&self, now: DateTime<Utc>) -> Result<MemoryState, SchedulingError> {
        FsrsCard::new(now).encode()
    }

    fn advance(
        &self,
        state: &MemoryState,
        rating: Rating,
        now: DateTime<Utc>,
        _response_latency_secs: Option<f64>,
    ) -> Result<Transition, SchedulingError> {
        let card = FsrsCard::decode(state)?;
        let (next, log) = self.review(&card, rating, now);
        Ok(Transition {
            state: next.encode()?,
            log,
        })
    }

    fn retrievability(
        &self,
        state: &MemoryState,
        now: DateTime<Utc>,
    ) -> Result<f64, SchedulingError> {
        let card = FsrsCard::decode(state)?;
        Ok(self.card_retrievability(&card, now))
    }

    fn due_at(&self, state: &MemoryState) -> Result<DateTime<Utc>, SchedulingError> {
        Ok(FsrsCard::decode(state)?.due)
    }

    fn stage(&self, state: &MemoryState) -> Result<Stage, SchedulingError> {
        Ok(FsrsCard::decode(state)?.state)
    }
}
