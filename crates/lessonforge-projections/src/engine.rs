//! Projection engine: keeps the read models consistent with the event log.
//!
//! The engine consumes `EventRecord`s — by direct notification via
//! [`ProjectionEngine::apply`] or by polling via
//! [`ProjectionEngine::catch_up`] — and routes them through per-event-type
//! handlers. Delivery is at-least-once; the per-row version guard makes
//! effects exactly-once. All mutation happens under a single write lock, so
//! the statistics singleton has one writer by construction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lessonforge_core::error::DomainError;
use lessonforge_core::store::{EventRecord, EventStore};
use lessonforge_quiz_generation::domain::aggregates::QuizStatus;
use lessonforge_quiz_generation::domain::events::QuizGenerationEventKind;

use crate::list::QuizListProjection;
use crate::statistics::QuizStatisticsProjection;

/// Events fetched per `read_all` page during catch-up and rebuild.
const BATCH_SIZE: usize = 256;

/// The full derived read-model state: list rows, the statistics singleton,
/// and the `read_all` cursor the state is current up to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionState {
    /// One row per quiz-generation stream, keyed by `aggregate_id`.
    pub quizzes: HashMap<String, QuizListProjection>,
    /// The statistics singleton.
    pub statistics: QuizStatisticsProjection,
    /// Global position of the last event consumed from `read_all`.
    pub position: Option<i64>,
}

/// A row whose version disagrees with its stream's latest version.
///
/// Advisory: streams holding events a projection deliberately rejected
/// (invalid transitions) or does not subscribe to will report here too.
/// Drift is repaired by [`ProjectionEngine::rebuild_all`], never by ad-hoc
/// patching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionDrift {
    /// The stream in question.
    pub aggregate_id: String,
    /// Version of the last event the projection applied.
    pub projected_version: i64,
    /// The stream's latest version in the store.
    pub stream_version: i64,
}

/// Maintains [`ProjectionState`] against an event store.
pub struct ProjectionEngine {
    store: Arc<dyn EventStore>,
    state: RwLock<ProjectionState>,
}

impl ProjectionEngine {
    /// Creates an engine with empty projection state.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            state: RwLock::new(ProjectionState::default()),
        }
    }

    /// Applies a single event to the projections.
    ///
    /// Idempotent: if the row for the event's aggregate already has
    /// `version >= event.version`, this is a no-op. Event types no
    /// projection subscribes to are ignored. The projection cursor is not
    /// advanced — replays delivered again through [`Self::catch_up`] are
    /// absorbed by the version guard.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the event would move a
    /// terminal row (the row is left unchanged; the log remains the truth),
    /// `DomainError::UnknownAggregate` if a non-initiating event targets a
    /// stream with no row, or `DomainError::Validation` on a payload decode
    /// failure. All are non-fatal to consuming loops.
    pub fn apply(&self, event: &EventRecord) -> Result<(), DomainError> {
        let mut state = self.state.write().expect("projection state lock poisoned");
        Self::apply_to_state(&mut state, event)
    }

    fn apply_to_state(state: &mut ProjectionState, event: &EventRecord) -> Result<(), DomainError> {
        let Some(kind) = QuizGenerationEventKind::decode(&event.event_type, &event.event_data)?
        else {
            // Forward compatibility: stored, but not subscribed to.
            return Ok(());
        };

        match kind {
            QuizGenerationEventKind::QuizInitiated(request) => {
                if let Some(row) = state.quizzes.get(&event.aggregate_id) {
                    if row.version >= event.version {
                        return Ok(());
                    }
                    return Err(DomainError::InvalidTransition {
                        aggregate_id: event.aggregate_id.clone(),
                        status: row.status.to_string(),
                        event_type: event.event_type.clone(),
                    });
                }
                let row = QuizListProjection::initiated(
                    event.aggregate_id.clone(),
                    &request,
                    event.occurred_at,
                    event.created_at,
                    event.version,
                );
                state.quizzes.insert(event.aggregate_id.clone(), row);
                state.statistics.record_initiated(event.created_at);
            }
            QuizGenerationEventKind::QuizCompleted(completed) => {
                let Some(row) = state.quizzes.get_mut(&event.aggregate_id) else {
                    return Err(DomainError::UnknownAggregate(event.aggregate_id.clone()));
                };
                if row.version >= event.version {
                    return Ok(());
                }
                if row.status.is_terminal() {
                    return Err(DomainError::InvalidTransition {
                        aggregate_id: event.aggregate_id.clone(),
                        status: row.status.to_string(),
                        event_type: event.event_type.clone(),
                    });
                }
                row.status = QuizStatus::Completed;
                row.completed_at = Some(event.occurred_at);
                row.last_updated = event.created_at;
                row.version = event.version;
                let duration_ms = (event.occurred_at - row.initiated_at).num_milliseconds();
                let topic = row.topic.clone();
                let grade_level = row.grade_level.clone();
                state.statistics.record_completed(
                    duration_ms,
                    completed.question_count,
                    &topic,
                    &grade_level,
                    event.created_at,
                );
            }
            QuizGenerationEventKind::QuizFailed(failed) => {
                let Some(row) = state.quizzes.get_mut(&event.aggregate_id) else {
                    return Err(DomainError::UnknownAggregate(event.aggregate_id.clone()));
                };
                if row.version >= event.version {
                    return Ok(());
                }
                if row.status.is_terminal() {
                    return Err(DomainError::InvalidTransition {
                        aggregate_id: event.aggregate_id.clone(),
                        status: row.status.to_string(),
                        event_type: event.event_type.clone(),
                    });
                }
                row.status = QuizStatus::Failed;
                row.error_message = Some(failed.error_message);
                row.completed_at = Some(event.occurred_at);
                row.last_updated = event.created_at;
                row.version = event.version;
                state.statistics.record_failed(event.created_at);
            }
        }
        Ok(())
    }

    /// True for handler outcomes the consuming loops absorb with a warning:
    /// the log stays authoritative and the conflicting event is not lost.
    fn is_non_fatal(error: &DomainError) -> bool {
        matches!(
            error,
            DomainError::InvalidTransition { .. }
                | DomainError::UnknownAggregate(_)
                | DomainError::Validation(_)
        )
    }

    fn apply_batch(state: &mut ProjectionState, batch: &[EventRecord]) -> Result<u64, DomainError> {
        let mut processed = 0;
        for event in batch {
            match Self::apply_to_state(state, event) {
                Ok(()) => processed += 1,
                Err(error) if Self::is_non_fatal(&error) => {
                    tracing::warn!(
                        aggregate_id = %event.aggregate_id,
                        event_type = %event.event_type,
                        version = event.version,
                        %error,
                        "projection handler rejected event"
                    );
                }
                Err(error) => return Err(error),
            }
            state.position = Some(event.global_position);
        }
        Ok(processed)
    }

    /// Incrementally applies all events appended since the last consumed
    /// cursor, in global append order. Restartable: crashing between pages
    /// loses nothing, the next call resumes from the stored cursor and the
    /// version guard absorbs redeliveries.
    ///
    /// Returns the number of events processed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` if the log cannot be read.
    pub async fn catch_up(&self) -> Result<u64, DomainError> {
        let mut processed = 0;
        loop {
            let cursor = self
                .state
                .read()
                .expect("projection state lock poisoned")
                .position;
            let batch = self.store.read_all(cursor, BATCH_SIZE).await?;
            if batch.is_empty() {
                return Ok(processed);
            }
            let mut state = self.state.write().expect("projection state lock poisoned");
            processed += Self::apply_batch(&mut state, &batch)?;
        }
    }

    /// Drops current projection state and replays the full log.
    ///
    /// The fresh state is built off to the side and swapped in atomically:
    /// readers never observe a partial rebuild, and an interrupted rebuild
    /// discards its partial state without touching the published one.
    /// Events appended while the scan runs are either seen by it or picked
    /// up by the next [`Self::catch_up`] — none are permanently skipped.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` if the log cannot be read;
    /// the published state is left as it was.
    pub async fn rebuild_all(&self) -> Result<(), DomainError> {
        let mut fresh = ProjectionState::default();
        loop {
            let batch = self.store.read_all(fresh.position, BATCH_SIZE).await?;
            if batch.is_empty() {
                break;
            }
            Self::apply_batch(&mut fresh, &batch)?;
        }

        let mut state = self.state.write().expect("projection state lock poisoned");
        *state = fresh;
        tracing::info!(
            quizzes = state.quizzes.len(),
            position = ?state.position,
            "projection rebuild complete"
        );
        Ok(())
    }

    /// Compares every projected row's version against its stream's latest
    /// version in the store. See [`ProjectionDrift`] for how to read the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StorageUnavailable` if a stream cannot be
    /// read.
    pub async fn check_consistency(&self) -> Result<Vec<ProjectionDrift>, DomainError> {
        let projected: Vec<(String, i64)> = {
            let state = self.state.read().expect("projection state lock poisoned");
            state
                .quizzes
                .iter()
                .map(|(id, row)| (id.clone(), row.version))
                .collect()
        };

        let mut drifts = Vec::new();
        for (aggregate_id, projected_version) in projected {
            let events = self.store.read_stream(&aggregate_id).await?;
            let stream_version = events.last().map_or(0, |event| event.version);
            if stream_version != projected_version {
                drifts.push(ProjectionDrift {
                    aggregate_id,
                    projected_version,
                    stream_version,
                });
            }
        }
        drifts.sort_by(|a, b| a.aggregate_id.cmp(&b.aggregate_id));
        Ok(drifts)
    }

    /// Returns the row for a quiz-generation stream, if projected.
    #[must_use]
    pub fn get_quiz(&self, aggregate_id: &str) -> Option<QuizListProjection> {
        self.state
            .read()
            .expect("projection state lock poisoned")
            .quizzes
            .get(aggregate_id)
            .cloned()
    }

    /// Returns all rows for a teacher, newest initiation first.
    #[must_use]
    pub fn list_by_teacher(&self, teacher_id: Uuid) -> Vec<QuizListProjection> {
        self.list_where(|row| row.teacher_id == teacher_id)
    }

    /// Returns all rows for a level, newest initiation first.
    #[must_use]
    pub fn list_by_level(&self, level_id: Uuid) -> Vec<QuizListProjection> {
        self.list_where(|row| row.level_id == level_id)
    }

    /// Returns all rows with the given status, newest initiation first.
    #[must_use]
    pub fn list_by_status(&self, status: QuizStatus) -> Vec<QuizListProjection> {
        self.list_where(|row| row.status == status)
    }

    fn list_where(&self, predicate: impl Fn(&QuizListProjection) -> bool) -> Vec<QuizListProjection> {
        let state = self.state.read().expect("projection state lock poisoned");
        let mut rows: Vec<QuizListProjection> = state
            .quizzes
            .values()
            .filter(|row| predicate(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.initiated_at
                .cmp(&a.initiated_at)
                .then_with(|| a.aggregate_id.cmp(&b.aggregate_id))
        });
        rows
    }

    /// Returns the statistics singleton.
    #[must_use]
    pub fn statistics(&self) -> QuizStatisticsProjection {
        self.state
            .read()
            .expect("projection state lock poisoned")
            .statistics
            .clone()
    }

    /// Returns a copy of the full projection state.
    #[must_use]
    pub fn snapshot(&self) -> ProjectionState {
        self.state
            .read()
            .expect("projection state lock poisoned")
            .clone()
    }
}
