//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to every domain event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type name for deserialization routing.
    pub event_type: String,
    /// Aggregate/stream this event belongs to.
    pub aggregate_id: String,
    /// Logical category of the aggregate (e.g. `"QuizGeneration"`).
    pub aggregate_type: String,
    /// Monotonically increasing, 1-based version within the stream.
    pub version: i64,
    /// Business time supplied by the writer.
    pub occurred_at: DateTime<Utc>,
    /// Optional actor reference; purely informational.
    pub user_id: Option<Uuid>,
}

/// Trait that all domain events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    ///
    /// The payload is the per-type payload struct alone; its schema is
    /// determined entirely by [`DomainEvent::event_type`].
    fn to_payload(&self) -> serde_json::Value;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata;
}
