//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A non-empty event stream was required but none exists.
    #[error("unknown aggregate: {0}")]
    UnknownAggregate(String),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: String,
        /// The version the caller expected.
        expected: i64,
        /// The actual current version.
        actual: i64,
    },

    /// An event would move a stream out of a terminal state.
    #[error("invalid transition on aggregate {aggregate_id}: {event_type} while {status}")]
    InvalidTransition {
        /// The aggregate the event targets.
        aggregate_id: String,
        /// The current (terminal) status of the stream.
        status: String,
        /// The event type that was rejected.
        event_type: String,
    },

    /// A validation error in domain logic or payload decoding.
    #[error("validation error: {0}")]
    Validation(String),

    /// A durability-layer failure; the operation did not partially persist.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl DomainError {
    /// True for errors a caller can recover from by re-reading state and
    /// retrying (stale version, missing stream).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::UnknownAggregate(_)
        )
    }
}
