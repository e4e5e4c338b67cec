//! # wordcards Core
//!
//! Domain types, traits, and error definitions for the wordcards
//! word-learning scheduling engine. This crate has **no storage or
//! scheduler dependencies**: it defines the model that every other crate
//! implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the engine is a trait here:
//! - [`MemoryModel`]: the spaced-repetition scheduler (pure, synchronous)
//! - [`CardStore`]: per (user, word) cards plus the append-only review log
//! - [`ProgressStore`]: per (user, lesson) progress rows
//! - [`Curriculum`]: read access to courses, lessons and words
//! - [`ActivityStore`]: daily activity used for streaks
//!
//! Implementations live in `wordcards-fsrs` and `wordcards-store`.

pub mod card;
pub mod curriculum;
pub mod error;
pub mod model;
pub mod progress;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use card::{
    Card, CardId, CardUpdate, MemoryState, NewCard, NewReview, Rating, Review, ReviewId, Stage,
    UserId, WordId,
};
pub use curriculum::{
    Course, CourseId, Curriculum, Lesson, LessonId, NewCourse, NewLesson, NewWord, Word,
};
pub use error::{Error, Result, SchedulingError, StoreError};
pub use model::{MemoryModel, ReviewLogEntry, Transition};
pub use progress::{
    LessonProgress, ProgressSummary, ReviewSession, SessionType, UserActivity, WordProgress,
    WordProgressReport, WordWithProgress,
};
pub use store::{ActivityStore, CardStore, ProgressStore};
