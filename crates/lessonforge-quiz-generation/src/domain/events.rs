//! Domain events for the Quiz Generation context.
//!
//! Payloads are serialized as the per-type struct alone — the payload
//! schema is determined entirely by the event type string, so consumers can
//! ignore event types they do not subscribe to without failing to decode
//! the rest of a stream.

use chrono::{DateTime, Utc};
use lessonforge_core::error::DomainError;
use lessonforge_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emitted when a quiz-generation request is accepted for processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizInitiated {
    /// The quiz being generated.
    pub quiz_id: Uuid,
    /// The teacher who requested the quiz.
    pub teacher_id: Uuid,
    /// The level the quiz belongs to.
    pub level_id: Uuid,
    /// Quiz title.
    pub title: String,
    /// Topic the questions are generated from.
    pub topic: String,
    /// Grade level label (e.g. `"Grade 5"`).
    pub grade_level: String,
    /// Number of questions requested.
    pub question_count: i32,
    /// Total score across all questions.
    pub total_score: i32,
    /// Planned quiz duration in minutes.
    pub duration_minutes: i32,
}

/// Emitted when generation finishes successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizCompleted {
    /// The quiz that was generated.
    pub quiz_id: Uuid,
    /// Number of questions actually generated.
    pub question_count: i32,
}

/// Emitted when generation fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizFailed {
    /// The quiz whose generation failed.
    pub quiz_id: Uuid,
    /// Human-readable failure reason.
    pub error_message: String,
}

/// Event type identifier for [`QuizInitiated`].
pub const QUIZ_INITIATED_EVENT_TYPE: &str = "QuizInitiated";

/// Event type identifier for [`QuizCompleted`].
pub const QUIZ_COMPLETED_EVENT_TYPE: &str = "QuizCompleted";

/// Event type identifier for [`QuizFailed`].
pub const QUIZ_FAILED_EVENT_TYPE: &str = "QuizFailed";

/// Aggregate type for quiz-generation streams.
pub const QUIZ_GENERATION_AGGREGATE_TYPE: &str = "QuizGeneration";

/// Event payload variants for the Quiz Generation context.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizGenerationEventKind {
    /// A quiz-generation request has been accepted.
    QuizInitiated(QuizInitiated),
    /// Generation finished successfully.
    QuizCompleted(QuizCompleted),
    /// Generation failed.
    QuizFailed(QuizFailed),
}

impl QuizGenerationEventKind {
    /// Decodes a stored payload by event type. Returns `Ok(None)` for event
    /// types this context does not subscribe to.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the payload does not match the
    /// schema implied by `event_type`.
    pub fn decode(
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<Self>, DomainError> {
        let decode_error =
            |e: serde_json::Error| DomainError::Validation(format!("event payload decode failed: {e}"));
        match event_type {
            QUIZ_INITIATED_EVENT_TYPE => serde_json::from_value(payload.clone())
                .map(|p| Some(Self::QuizInitiated(p)))
                .map_err(decode_error),
            QUIZ_COMPLETED_EVENT_TYPE => serde_json::from_value(payload.clone())
                .map(|p| Some(Self::QuizCompleted(p)))
                .map_err(decode_error),
            QUIZ_FAILED_EVENT_TYPE => serde_json::from_value(payload.clone())
                .map(|p| Some(Self::QuizFailed(p)))
                .map_err(decode_error),
            _ => Ok(None),
        }
    }

    /// Returns the event type identifier for this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::QuizInitiated(_) => QUIZ_INITIATED_EVENT_TYPE,
            Self::QuizCompleted(_) => QUIZ_COMPLETED_EVENT_TYPE,
            Self::QuizFailed(_) => QUIZ_FAILED_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for the Quiz Generation context.
#[derive(Debug, Clone)]
pub struct QuizGenerationEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: QuizGenerationEventKind,
}

impl QuizGenerationEvent {
    /// Builds a new event envelope for an uncommitted domain event.
    #[must_use]
    pub fn new(
        aggregate_id: String,
        version: i64,
        kind: QuizGenerationEventKind,
        occurred_at: DateTime<Utc>,
        user_id: Option<Uuid>,
    ) -> Self {
        Self {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id,
                aggregate_type: QUIZ_GENERATION_AGGREGATE_TYPE.to_owned(),
                version,
                occurred_at,
                user_id,
            },
            kind,
        }
    }
}

impl DomainEvent for QuizGenerationEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        match &self.kind {
            QuizGenerationEventKind::QuizInitiated(p) => serde_json::to_value(p),
            QuizGenerationEventKind::QuizCompleted(p) => serde_json::to_value(p),
            QuizGenerationEventKind::QuizFailed(p) => serde_json::to_value(p),
        }
        .expect("quiz generation payload serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
