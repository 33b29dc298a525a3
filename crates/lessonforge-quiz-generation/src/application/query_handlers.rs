//! Query handlers for the Quiz Generation context.
//!
//! This module contains query handlers that reconstruct aggregates from
//! stored events and return read-only view DTOs. Interactive reads should
//! prefer the projections; these queries replay the stream and exist for
//! debugging and audit.

use chrono::{DateTime, Utc};
use lessonforge_core::aggregate::AggregateRoot;
use lessonforge_core::error::DomainError;
use lessonforge_core::store::EventStore;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers;
use crate::domain::aggregates::QuizStatus;

/// Read-only view of a quiz-generation aggregate.
#[derive(Debug, Serialize)]
pub struct QuizGenerationView {
    /// The aggregate identifier.
    pub aggregate_id: String,
    /// The quiz being generated.
    pub quiz_id: Option<Uuid>,
    /// The requesting teacher.
    pub teacher_id: Option<Uuid>,
    /// The level the quiz belongs to.
    pub level_id: Option<Uuid>,
    /// Quiz title.
    pub title: Option<String>,
    /// Topic the questions are generated from.
    pub topic: Option<String>,
    /// Grade level label.
    pub grade_level: Option<String>,
    /// Number of questions requested.
    pub question_count: Option<i32>,
    /// Number of questions actually generated.
    pub generated_question_count: Option<i32>,
    /// Lifecycle status.
    pub status: Option<QuizStatus>,
    /// Failure reason, if generation failed.
    pub error_message: Option<String>,
    /// Business time of initiation.
    pub initiated_at: Option<DateTime<Utc>>,
    /// Business time of reaching a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Current version (event count).
    pub version: i64,
}

/// Retrieves a quiz-generation aggregate by its ID, replaying its stream.
///
/// # Errors
///
/// Returns `DomainError::UnknownAggregate` if no events exist for the ID,
/// `DomainError::Validation` if a payload fails to decode, or
/// `DomainError::StorageUnavailable` on read failure.
pub async fn get_quiz_generation_by_id(
    aggregate_id: &str,
    store: &dyn EventStore,
) -> Result<QuizGenerationView, DomainError> {
    let quiz = command_handlers::reconstruct_existing(aggregate_id, store).await?;
    let request = quiz.request.as_ref();
    Ok(QuizGenerationView {
        aggregate_id: quiz.id.clone(),
        quiz_id: request.map(|r| r.quiz_id),
        teacher_id: request.map(|r| r.teacher_id),
        level_id: request.map(|r| r.level_id),
        title: request.map(|r| r.title.clone()),
        topic: request.map(|r| r.topic.clone()),
        grade_level: request.map(|r| r.grade_level.clone()),
        question_count: request.map(|r| r.question_count),
        generated_question_count: quiz.generated_question_count,
        status: quiz.status,
        error_message: quiz.error_message.clone(),
        initiated_at: quiz.initiated_at,
        completed_at: quiz.completed_at,
        version: quiz.version(),
    })
}
