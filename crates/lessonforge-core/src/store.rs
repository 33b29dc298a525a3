//! Event store abstraction.
//!
//! The store is the source of truth: an append-only, per-aggregate-versioned
//! log. Projections and aggregate reconstruction are derived entirely from
//! what this trait exposes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Stored representation of a domain event. Immutable once persisted; the
/// core contract has no update or delete operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique event identifier, generated at append time.
    pub event_id: Uuid,
    /// Aggregate/stream this event belongs to.
    pub aggregate_id: String,
    /// Logical category of the aggregate (e.g. `"QuizGeneration"`).
    pub aggregate_type: String,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized payload; schema determined by `event_type`.
    pub event_data: serde_json::Value,
    /// 1-based version within the stream; gap-free and unique per
    /// `aggregate_id`.
    pub version: i64,
    /// Business time supplied by the writer.
    pub occurred_at: DateTime<Utc>,
    /// Store-assigned append time; strictly increasing, never equal across
    /// distinct events.
    pub created_at: DateTime<Utc>,
    /// Store-assigned position in the global append order. Cursor for
    /// [`EventStore::read_all`].
    pub global_position: i64,
    /// Optional actor reference; purely informational.
    pub user_id: Option<Uuid>,
}

/// An event submitted for appending. The store assigns `event_id`,
/// `version`, `created_at`, and `global_position` on success.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Aggregate/stream to append to.
    pub aggregate_id: String,
    /// Logical category of the aggregate.
    pub aggregate_type: String,
    /// Event type name. The store accepts any type, including ones no
    /// projection subscribes to.
    pub event_type: String,
    /// Serialized payload.
    pub event_data: serde_json::Value,
    /// Business time supplied by the writer.
    pub occurred_at: DateTime<Utc>,
    /// Optional actor reference.
    pub user_id: Option<Uuid>,
}

/// Append-only event store with optimistic concurrency.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a single event to its aggregate stream.
    ///
    /// `expected_version` must equal the current highest version for the
    /// aggregate (0 for a stream that does not exist yet). On success the
    /// event is persisted atomically with `version = expected_version + 1`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` (carrying the actual
    /// current version) when `expected_version` is stale, or
    /// `DomainError::StorageUnavailable` on a durability failure. A failed
    /// append persists nothing.
    async fn append(
        &self,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<EventRecord, DomainError>;

    /// Loads all events for an aggregate in strictly increasing version
    /// order. An unknown aggregate yields an empty vec, not an error.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` on a durability failure.
    async fn read_stream(&self, aggregate_id: &str) -> Result<Vec<EventRecord>, DomainError>;

    /// Reads a batch of events across all aggregates in global append
    /// order, starting after `after_position` (`None` = from the
    /// beginning). Returns at most `limit` events; an empty vec means the
    /// cursor has reached the head of the log.
    ///
    /// Paging keeps memory bounded for slow consumers and makes projection
    /// catch-up restartable from any cursor.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` on a durability failure.
    async fn read_all(
        &self,
        after_position: Option<i64>,
        limit: usize,
    ) -> Result<Vec<EventRecord>, DomainError>;
}
