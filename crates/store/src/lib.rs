//! Persistence adapters for wordcards.
//!
//! Each store implements every persistence seam of `wordcards-core`
//! ([`CardStore`](wordcards_core::CardStore),
//! [`ProgressStore`](wordcards_core::ProgressStore),
//! [`Curriculum`](wordcards_core::Curriculum),
//! [`ActivityStore`](wordcards_core::ActivityStore)) over one backing
//! database, plus inherent methods for writing curriculum data.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
