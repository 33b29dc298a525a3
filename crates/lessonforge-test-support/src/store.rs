//! Test stores — mock `EventStore` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use lessonforge_core::error::DomainError;
use lessonforge_core::store::{EventRecord, EventStore, NewEvent};
use uuid::Uuid;

/// An event store that records all `append` calls. Returns the configured
/// result from `read_stream` on every call and always succeeds on `append`,
/// synthesizing the stored record from the request.
#[derive(Debug)]
pub struct RecordingEventStore {
    read_result: Mutex<Vec<EventRecord>>,
    appended: Mutex<Vec<(NewEvent, i64)>>,
}

impl RecordingEventStore {
    /// Create a new recording store that will return `read_result` from
    /// every `read_stream` call.
    #[must_use]
    pub fn new(read_result: Vec<EventRecord>) -> Self {
        Self {
            read_result: Mutex::new(read_result),
            appended: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all append requests, with their expected
    /// versions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<(NewEvent, i64)> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventStore for RecordingEventStore {
    async fn append(
        &self,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<EventRecord, DomainError> {
        let mut appended = self.appended.lock().unwrap();
        appended.push((event.clone(), expected_version));
        #[allow(clippy::cast_possible_wrap)]
        let global_position = appended.len() as i64;
        Ok(EventRecord {
            event_id: Uuid::new_v4(),
            aggregate_id: event.aggregate_id,
            aggregate_type: event.aggregate_type,
            event_type: event.event_type,
            event_data: event.event_data,
            version: expected_version + 1,
            occurred_at: event.occurred_at,
            created_at: event.occurred_at,
            global_position,
            user_id: event.user_id,
        })
    }

    async fn read_stream(&self, _aggregate_id: &str) -> Result<Vec<EventRecord>, DomainError> {
        Ok(self.read_result.lock().unwrap().clone())
    }

    async fn read_all(
        &self,
        _after_position: Option<i64>,
        _limit: usize,
    ) -> Result<Vec<EventRecord>, DomainError> {
        Ok(Vec::new())
    }
}

/// An event store that always returns empty reads and silently accepts
/// appends. Useful for testing "aggregate not found" scenarios and creation
/// commands.
#[derive(Debug)]
pub struct EmptyEventStore;

#[async_trait]
impl EventStore for EmptyEventStore {
    async fn append(
        &self,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<EventRecord, DomainError> {
        Ok(EventRecord {
            event_id: Uuid::new_v4(),
            aggregate_id: event.aggregate_id,
            aggregate_type: event.aggregate_type,
            event_type: event.event_type,
            event_data: event.event_data,
            version: expected_version + 1,
            occurred_at: event.occurred_at,
            created_at: event.occurred_at,
            global_position: expected_version + 1,
            user_id: event.user_id,
        })
    }

    async fn read_stream(&self, _aggregate_id: &str) -> Result<Vec<EventRecord>, DomainError> {
        Ok(Vec::new())
    }

    async fn read_all(
        &self,
        _after_position: Option<i64>,
        _limit: usize,
    ) -> Result<Vec<EventRecord>, DomainError> {
        Ok(Vec::new())
    }
}

/// An event store that always returns a storage error. Useful for testing
/// error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append(
        &self,
        _event: NewEvent,
        _expected_version: i64,
    ) -> Result<EventRecord, DomainError> {
        Err(DomainError::StorageUnavailable("connection refused".into()))
    }

    async fn read_stream(&self, _aggregate_id: &str) -> Result<Vec<EventRecord>, DomainError> {
        Err(DomainError::StorageUnavailable("connection refused".into()))
    }

    async fn read_all(
        &self,
        _after_position: Option<i64>,
        _limit: usize,
    ) -> Result<Vec<EventRecord>, DomainError> {
        Err(DomainError::StorageUnavailable("connection refused".into()))
    }
}
