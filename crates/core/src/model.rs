//! Memory model trait: the pluggable spaced-repetition scheduler.
//!
//! A memory model is a pure function object: given a prior state, a rating
//! and the current time it returns the next state plus a log entry. The
//! engine depends on nothing else, so swapping the decay formula never
//! touches scheduling logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::{MemoryState, Rating, Stage};
use crate::error::SchedulingError;

/// Scheduling metadata returned alongside a new state.
///
/// Stored on the review row for audit; never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLogEntry {
    pub reviewed_at: DateTime<Utc>,
    /// Days until the card is next due (0 for same-day steps)
    #[serde(default)]
    pub scheduled_days: Option<i64>,
    /// Whole days since the previous review
    #[serde(default)]
    pub elapsed_days: Option<i64>,
    /// Times the card has been forgotten after graduating
    #[serde(default)]
    pub lapses: Option<i64>,
}

/// Result of applying one rating.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: MemoryState,
    pub log: ReviewLogEntry,
}

/// The core MemoryModel trait.
///
/// Implementations: FSRS (`wordcards-fsrs`), stubs in tests.
pub trait MemoryModel: Send + Sync {
    /// The model name (e.g., "fsrs").
    fn name(&self) -> &str;

    /// Zero-history state for a brand new card.
    fn initial_state(&self, now: DateTime<Utc>) -> Result<MemoryState, SchedulingError>;

    /// Apply a rating. Deterministic given its inputs.
    fn advance(
        &self,
        state: &MemoryState,
        rating: Rating,
        now: DateTime<Utc>,
        response_latency_secs: Option<f64>,
    ) -> Result<Transition, SchedulingError>;

    /// Estimated probability of recall at `now`, in `[0, 1]`.
    fn retrievability(&self, state: &MemoryState, now: DateTime<Utc>)
    -> Result<f64, SchedulingError>;

    /// When the card is next due.
    fn due_at(&self, state: &MemoryState) -> Result<DateTime<Utc>, SchedulingError>;

    /// Current learning stage.
    fn stage(&self, state: &MemoryState) -> Result<Stage, SchedulingError>;

    /// Whether the card is due at `now`.
    fn is_due(&self, state: &MemoryState, now: DateTime<Utc>) -> Result<bool, SchedulingError> {
        Ok(self.due_at(state)? <= now)
    }
}
