//! Per-quiz list projection.

use chrono::{DateTime, Duration, Utc};
use lessonforge_quiz_generation::domain::aggregates::QuizStatus;
use lessonforge_quiz_generation::domain::events::QuizInitiated;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Denormalized snapshot of a quiz-generation stream's latest state, one
/// row per `aggregate_id`.
///
/// `status` is the single source of truth for lifecycle state; the
/// completion/failure flags and processing duration are accessors derived
/// from it, so a rebuild always regenerates them consistently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizListProjection {
    /// The stream this row mirrors.
    pub aggregate_id: String,
    /// The quiz being generated.
    pub quiz_id: Uuid,
    /// The requesting teacher.
    pub teacher_id: Uuid,
    /// The level the quiz belongs to.
    pub level_id: Uuid,
    /// Quiz title.
    pub title: String,
    /// Topic the questions are generated from.
    pub topic: String,
    /// Grade level label.
    pub grade_level: String,
    /// Number of questions requested.
    pub question_count: i32,
    /// Total score across all questions.
    pub total_score: i32,
    /// Planned quiz duration in minutes.
    pub duration_minutes: i32,
    /// Lifecycle status.
    pub status: QuizStatus,
    /// Failure reason; set iff `status` is `Failed`.
    pub error_message: Option<String>,
    /// Business time of initiation.
    pub initiated_at: DateTime<Utc>,
    /// Business time of reaching a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Store time of the last applied event.
    pub last_updated: DateTime<Utc>,
    /// Version of the last applied event; the idempotence guard.
    pub version: i64,
}

impl QuizListProjection {
    /// Creates the row for a freshly initiated stream.
    #[must_use]
    pub fn initiated(
        aggregate_id: String,
        request: &QuizInitiated,
        initiated_at: DateTime<Utc>,
        last_updated: DateTime<Utc>,
        version: i64,
    ) -> Self {
        Self {
            aggregate_id,
            quiz_id: request.quiz_id,
            teacher_id: request.teacher_id,
            level_id: request.level_id,
            title: request.title.clone(),
            topic: request.topic.clone(),
            grade_level: request.grade_level.clone(),
            question_count: request.question_count,
            total_score: request.total_score,
            duration_minutes: request.duration_minutes,
            status: QuizStatus::Processing,
            error_message: None,
            initiated_at,
            completed_at: None,
            last_updated,
            version,
        }
    }

    /// True when generation finished successfully. Always agrees with
    /// [`QuizListProjection::status`].
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == QuizStatus::Completed
    }

    /// True when generation failed. Always agrees with
    /// [`QuizListProjection::status`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == QuizStatus::Failed
    }

    /// Time from initiation to the terminal state; `None` while still
    /// processing.
    #[must_use]
    pub fn processing_duration(&self) -> Option<Duration> {
        self.completed_at
            .map(|completed_at| completed_at - self.initiated_at)
    }
}
