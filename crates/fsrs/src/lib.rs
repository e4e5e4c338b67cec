//! FSRS-style memory model for wordcards.
//!
//! Implements [`wordcards_core::MemoryModel`] with the FSRS-5 formulas:
//! stability/difficulty tracking, same-day learning steps, and intervals
//! chosen so that recall probability has decayed to the desired retention
//! when a card comes due. Interval fuzzing is not applied, so scheduling is
//! fully deterministic.

pub mod algorithm;
pub mod parameters;
pub mod scheduler;

pub use parameters::FsrsParameters;
pub use scheduler::{FsrsCard, FsrsScheduler};

/// Errors from invalid scheduler parameters.
#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("desired_retention must be in (0, 1), got {0}")]
    Retention(f64),

    #[error("maximum_interval_days must be at least 1, got {0}")]
    MaximumInterval(i64),

    #[error("expected {expected} weights, got {actual}")]
    WeightCount { expected: usize, actual: usize },

    #[error("weight {index} is invalid: {value}")]
    Weight { index: usize, value: f64 },

    #[error("learning and relearning steps must be positive")]
    Step,
}
