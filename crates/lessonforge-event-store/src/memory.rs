//! In-memory implementation of the `EventStore` trait.
//!
//! Keeps the full log in a single `RwLock`-guarded structure: a global
//! append-ordered vec plus a per-stream index into it. The lock is held only
//! for the version check and push, so writers decide on `expected_version`
//! outside any critical section (optimistic concurrency).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use lessonforge_core::clock::{Clock, SystemClock};
use lessonforge_core::error::DomainError;
use lessonforge_core::store::{EventRecord, EventStore, NewEvent};

/// In-memory event store keyed by `aggregate_id`, with a global position
/// counter for cross-aggregate ordering.
pub struct InMemoryEventStore {
    clock: Arc<dyn Clock>,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Per-stream indices into `log`, in version order.
    streams: HashMap<String, Vec<usize>>,
    /// All events in append order; `global_position` is `index + 1`.
    log: Vec<EventRecord>,
}

impl InMemoryEventStore {
    /// Creates a store backed by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a store with an injected clock, for deterministic tests.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<EventRecord, DomainError> {
        let now = self.clock.now();
        let mut inner = self.inner.write().expect("event store lock poisoned");

        #[allow(clippy::cast_possible_wrap)]
        let actual = inner
            .streams
            .get(&event.aggregate_id)
            .map_or(0, |indices| indices.len() as i64);
        if actual != expected_version {
            tracing::debug!(
                aggregate_id = %event.aggregate_id,
                expected = expected_version,
                actual,
                "append rejected: stale expected version"
            );
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: event.aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        // `created_at` must never be equal across distinct events; bump past
        // the previous append when the clock has not advanced.
        let created_at = match inner.log.last() {
            Some(last) if now <= last.created_at => last.created_at + Duration::microseconds(1),
            _ => now,
        };

        let index = inner.log.len();
        #[allow(clippy::cast_possible_wrap)]
        let record = EventRecord {
            event_id: Uuid::new_v4(),
            aggregate_id: event.aggregate_id,
            aggregate_type: event.aggregate_type,
            event_type: event.event_type,
            event_data: event.event_data,
            version: actual + 1,
            occurred_at: event.occurred_at,
            created_at,
            global_position: (index + 1) as i64,
            user_id: event.user_id,
        };

        inner
            .streams
            .entry(record.aggregate_id.clone())
            .or_default()
            .push(index);
        inner.log.push(record.clone());

        tracing::trace!(
            aggregate_id = %record.aggregate_id,
            event_type = %record.event_type,
            version = record.version,
            "event appended"
        );
        Ok(record)
    }

    async fn read_stream(&self, aggregate_id: &str) -> Result<Vec<EventRecord>, DomainError> {
        let inner = self.inner.read().expect("event store lock poisoned");
        let events = inner
            .streams
            .get(aggregate_id)
            .map(|indices| indices.iter().map(|&i| inner.log[i].clone()).collect())
            .unwrap_or_default();
        Ok(events)
    }

    async fn read_all(
        &self,
        after_position: Option<i64>,
        limit: usize,
    ) -> Result<Vec<EventRecord>, DomainError> {
        let inner = self.inner.read().expect("event store lock poisoned");
        // Positions are dense (1-based), so the cursor doubles as an index.
        #[allow(clippy::cast_sign_loss)]
        let start = after_position.unwrap_or(0).max(0) as usize;
        let batch = inner
            .log
            .get(start..)
            .unwrap_or_default()
            .iter()
            .take(limit)
            .cloned()
            .collect();
        Ok(batch)
    }
}
