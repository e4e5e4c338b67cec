//! Error types for the wordcards domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all engine operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Lookup errors ---
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    // --- Caller input ---
    #[error("Validation error: {0}")]
    Validation(String),

    // --- Memory model errors ---
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    // --- Persistence errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// True for errors the caller caused (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Validation(_))
    }

    /// HTTP-equivalent status code for the outer layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation(_) => 400,
            Self::Scheduling(_) | Self::Store(_) | Self::Serialization(_) => 500,
        }
    }

    /// Message safe to hand back to a caller.
    ///
    /// Server-side failures collapse to a generic message; the internal
    /// cause is only ever logged.
    pub fn public_message(&self) -> String {
        match self {
            Self::NotFound { entity, .. } => format!("{entity} not found"),
            Self::Validation(msg) => msg.clone(),
            Self::Scheduling(_) => "Could not schedule the review".into(),
            Self::Store(_) | Self::Serialization(_) => "Internal error".into(),
        }
    }
}

// --- Bounded context errors ---

/// The memory model refused or could not process a state transition.
///
/// Never retried: it means corrupted data or a stored-state format the
/// current model does not understand.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchedulingError {
    #[error("Invalid rating value: {0} (expected 1-4)")]
    InvalidRating(i64),

    #[error("Malformed memory state: {0}")]
    MalformedState(String),

    #[error("Memory model rejected transition: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// A uniqueness or optimistic-version check failed.
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_client_error() {
        let err = Error::not_found("Word", 42);
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), 404);
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn scheduling_error_hides_cause() {
        let err = Error::Scheduling(SchedulingError::MalformedState(
            "missing field `stability` at line 1".into(),
        ));
        assert!(!err.is_client_error());
        assert_eq!(err.status_code(), 500);
        assert!(!err.public_message().contains("stability"));
        assert!(err.to_string().contains("stability"));
    }

    #[test]
    fn store_error_maps_to_server_error() {
        let err: Error = StoreError::Storage("disk I/O error".into()).into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "Internal error");
    }
}
