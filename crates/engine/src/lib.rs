//! The wordcards learning engine.
//!
//! A rating flows through the [`SchedulingEngine`] (card lookup or
//! creation, memory model, atomic commit of card and review), then the
//! [`LessonProgressAggregator`] re-derives the lesson's counters. The
//! [`ReviewSessionBuilder`] reads the same cards to compose the next
//! session. [`LearningService`] wires these together for callers.

pub mod aggregator;
pub mod scheduling;
pub mod service;
pub mod session;
pub mod streak;

#[cfg(test)]
mod test_support;

pub use aggregator::LessonProgressAggregator;
pub use scheduling::{ReviewContext, SchedulingEngine};
pub use service::{LearningService, RatingOutcome, ServiceSettings};
pub use session::ReviewSessionBuilder;
pub use streak::{StreakTracker, advance_streak};
