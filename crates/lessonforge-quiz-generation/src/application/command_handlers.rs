//! Command handlers for the Quiz Generation context.
//!
//! This module contains application-level command handler functions that
//! orchestrate domain logic: reconstruct the aggregate from its stream,
//! execute the command, and persist the produced events under the
//! aggregate's reconstructed version (optimistic concurrency). It also
//! hosts the aggregate reconstructor, a pure left fold over a stream.

use lessonforge_core::aggregate::AggregateRoot;
use lessonforge_core::clock::Clock;
use lessonforge_core::error::DomainError;
use lessonforge_core::event::DomainEvent;
use lessonforge_core::store::{EventRecord, EventStore, NewEvent};

use crate::domain::aggregates::QuizGeneration;
use crate::domain::commands::{
    CompleteQuizGeneration, FailQuizGeneration, InitiateQuizGeneration,
};
use crate::domain::events::{QuizGenerationEvent, QuizGenerationEventKind};

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct QuizGenerationCommandResult {
    /// The aggregate ID affected or created by the command.
    pub aggregate_id: String,
    /// The stored events produced and persisted.
    pub stored_events: Vec<EventRecord>,
}

fn to_new_event(event: &QuizGenerationEvent) -> NewEvent {
    let meta = event.metadata();
    NewEvent {
        aggregate_id: meta.aggregate_id.clone(),
        aggregate_type: meta.aggregate_type.clone(),
        event_type: event.event_type().to_owned(),
        event_data: event.to_payload(),
        occurred_at: meta.occurred_at,
        user_id: meta.user_id,
    }
}

/// Folds stored events into a `QuizGeneration` aggregate.
///
/// Event types this context does not subscribe to leave the state untouched
/// but still advance the aggregate version, so the reconstructed version
/// stays usable as `expected_version` even as the stream's schema evolves.
///
/// # Errors
///
/// Returns `DomainError::Validation` if a subscribed event's payload fails
/// to decode.
pub fn reconstitute(
    aggregate_id: &str,
    existing_events: &[EventRecord],
) -> Result<QuizGeneration, DomainError> {
    let mut quiz = QuizGeneration::new(aggregate_id.to_owned());
    for stored in existing_events {
        if let Some(kind) =
            QuizGenerationEventKind::decode(&stored.event_type, &stored.event_data)?
        {
            let event = QuizGenerationEvent {
                metadata: lessonforge_core::event::EventMetadata {
                    event_id: stored.event_id,
                    event_type: stored.event_type.clone(),
                    aggregate_id: stored.aggregate_id.clone(),
                    aggregate_type: stored.aggregate_type.clone(),
                    version: stored.version,
                    occurred_at: stored.occurred_at,
                    user_id: stored.user_id,
                },
                kind,
            };
            quiz.apply(&event);
        }
        quiz.version = stored.version;
    }
    Ok(quiz)
}

/// Reconstructs the current logical state of an aggregate from its stream.
///
/// An empty stream yields the defined initial state (version 0, not yet
/// initiated) — use [`reconstruct_existing`] when absence is an error.
///
/// # Errors
///
/// Returns `DomainError::StorageUnavailable` if the stream cannot be read,
/// or `DomainError::Validation` if a payload fails to decode.
pub async fn reconstruct(
    aggregate_id: &str,
    store: &dyn EventStore,
) -> Result<QuizGeneration, DomainError> {
    let existing_events = store.read_stream(aggregate_id).await?;
    reconstitute(aggregate_id, &existing_events)
}

/// Reconstructs an aggregate that is required to exist.
///
/// # Errors
///
/// Returns `DomainError::UnknownAggregate` if the stream is empty, plus the
/// errors of [`reconstruct`].
pub async fn reconstruct_existing(
    aggregate_id: &str,
    store: &dyn EventStore,
) -> Result<QuizGeneration, DomainError> {
    let existing_events = store.read_stream(aggregate_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::UnknownAggregate(aggregate_id.to_owned()));
    }
    reconstitute(aggregate_id, &existing_events)
}

/// Appends the aggregate's uncommitted events one at a time, each under the
/// version the aggregate held when the event was produced.
async fn persist_uncommitted(
    quiz: &QuizGeneration,
    store: &dyn EventStore,
) -> Result<Vec<EventRecord>, DomainError> {
    let mut stored_events = Vec::with_capacity(quiz.uncommitted_events().len());
    for (offset, event) in quiz.uncommitted_events().iter().enumerate() {
        #[allow(clippy::cast_possible_wrap)]
        let expected_version = quiz.version() + offset as i64;
        let record = store.append(to_new_event(event), expected_version).await?;
        stored_events.push(record);
    }
    Ok(stored_events)
}

/// Handles the `InitiateQuizGeneration` command: creates a fresh aggregate,
/// initiates it, and persists the resulting event with `expected_version`
/// 0. A concurrent initiator of the same stream loses with
/// `ConcurrencyConflict`.
///
/// # Errors
///
/// Returns `DomainError` if the stream already exists (concurrency
/// conflict) or event appending fails.
pub async fn handle_initiate_quiz_generation(
    command: &InitiateQuizGeneration,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<QuizGenerationCommandResult, DomainError> {
    let mut quiz = QuizGeneration::new(command.aggregate_id.clone());
    quiz.initiate(command.request.clone(), command.user_id, clock)?;

    let stored_events = persist_uncommitted(&quiz, store).await?;

    tracing::info!(
        aggregate_id = %command.aggregate_id,
        quiz_id = %command.request.quiz_id,
        "quiz generation initiated"
    );
    Ok(QuizGenerationCommandResult {
        aggregate_id: command.aggregate_id.clone(),
        stored_events,
    })
}

/// Handles the `CompleteQuizGeneration` command: reconstructs the
/// aggregate, records completion, and persists the resulting event.
///
/// # Errors
///
/// Returns `DomainError::UnknownAggregate` if the stream does not exist,
/// `DomainError::InvalidTransition` if it is already terminal, or storage
/// errors from loading/appending.
pub async fn handle_complete_quiz_generation(
    command: &CompleteQuizGeneration,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<QuizGenerationCommandResult, DomainError> {
    let mut quiz = reconstruct_existing(&command.aggregate_id, store).await?;
    quiz.complete(command.question_count, command.user_id, clock)?;

    let stored_events = persist_uncommitted(&quiz, store).await?;

    tracing::info!(
        aggregate_id = %command.aggregate_id,
        question_count = command.question_count,
        "quiz generation completed"
    );
    Ok(QuizGenerationCommandResult {
        aggregate_id: command.aggregate_id.clone(),
        stored_events,
    })
}

/// Handles the `FailQuizGeneration` command: reconstructs the aggregate,
/// records the failure, and persists the resulting event.
///
/// # Errors
///
/// Returns `DomainError::UnknownAggregate` if the stream does not exist,
/// `DomainError::InvalidTransition` if it is already terminal, or storage
/// errors from loading/appending.
pub async fn handle_fail_quiz_generation(
    command: &FailQuizGeneration,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<QuizGenerationCommandResult, DomainError> {
    let mut quiz = reconstruct_existing(&command.aggregate_id, store).await?;
    quiz.fail(command.error_message.clone(), command.user_id, clock)?;

    let stored_events = persist_uncommitted(&quiz, store).await?;

    tracing::warn!(
        aggregate_id = %command.aggregate_id,
        error_message = %command.error_message,
        "quiz generation failed"
    );
    Ok(QuizGenerationCommandResult {
        aggregate_id: command.aggregate_id.clone(),
        stored_events,
    })
}
