//! Aggregate roots for the Quiz Generation context.

use chrono::{DateTime, Utc};
use lessonforge_core::aggregate::AggregateRoot;
use lessonforge_core::clock::Clock;
use lessonforge_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    QuizCompleted, QuizFailed, QuizGenerationEvent, QuizGenerationEventKind, QuizInitiated,
};

/// Lifecycle status of a quiz-generation stream.
///
/// `Processing → Completed` and `Processing → Failed` are the only
/// transitions; both targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuizStatus {
    /// Generation is in flight.
    Processing,
    /// Generation finished successfully. Terminal.
    Completed,
    /// Generation failed. Terminal.
    Failed,
}

impl QuizStatus {
    /// True for states with no outgoing transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for QuizStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// The aggregate root for a quiz-generation request.
///
/// A fresh aggregate (no events) is the defined initial state: version 0,
/// no status, no request details.
#[derive(Debug)]
pub struct QuizGeneration {
    /// Aggregate identifier.
    pub id: String,
    /// Current version (event count).
    pub(crate) version: i64,
    /// Lifecycle status; `None` until initiated.
    pub status: Option<QuizStatus>,
    /// Details of the request, captured at initiation.
    pub request: Option<QuizInitiated>,
    /// Number of questions actually generated, set on completion.
    pub generated_question_count: Option<i32>,
    /// Failure reason, set when generation fails.
    pub error_message: Option<String>,
    /// Business time of initiation.
    pub initiated_at: Option<DateTime<Utc>>,
    /// Business time of reaching a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<QuizGenerationEvent>,
}

impl QuizGeneration {
    /// Creates a new, uninitiated quiz-generation aggregate.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self {
            id,
            version: 0,
            status: None,
            request: None,
            generated_question_count: None,
            error_message: None,
            initiated_at: None,
            completed_at: None,
            uncommitted_events: Vec::new(),
        }
    }

    /// Returns the version the next produced event will carry.
    #[allow(clippy::cast_possible_wrap)]
    fn next_version(&self) -> i64 {
        self.version + self.uncommitted_events.len() as i64 + 1
    }

    fn record(&mut self, kind: QuizGenerationEventKind, user_id: Option<Uuid>, clock: &dyn Clock) {
        let event = QuizGenerationEvent::new(
            self.id.clone(),
            self.next_version(),
            kind,
            clock.now(),
            user_id,
        );
        self.uncommitted_events.push(event);
    }

    /// Accepts a quiz-generation request, producing a `QuizInitiated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the stream has already been
    /// initiated.
    pub fn initiate(
        &mut self,
        request: QuizInitiated,
        user_id: Option<Uuid>,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status.is_some() {
            return Err(DomainError::Validation(format!(
                "quiz generation {} already initiated",
                self.id
            )));
        }
        self.record(
            QuizGenerationEventKind::QuizInitiated(request),
            user_id,
            clock,
        );
        Ok(())
    }

    /// Marks generation as finished, producing a `QuizCompleted` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownAggregate` if the stream was never
    /// initiated, or `DomainError::InvalidTransition` if it is already
    /// terminal.
    pub fn complete(
        &mut self,
        question_count: i32,
        user_id: Option<Uuid>,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let quiz_id = self.guard_processing(super::events::QUIZ_COMPLETED_EVENT_TYPE)?;
        self.record(
            QuizGenerationEventKind::QuizCompleted(QuizCompleted {
                quiz_id,
                question_count,
            }),
            user_id,
            clock,
        );
        Ok(())
    }

    /// Marks generation as failed, producing a `QuizFailed` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownAggregate` if the stream was never
    /// initiated, or `DomainError::InvalidTransition` if it is already
    /// terminal.
    pub fn fail(
        &mut self,
        error_message: String,
        user_id: Option<Uuid>,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let quiz_id = self.guard_processing(super::events::QUIZ_FAILED_EVENT_TYPE)?;
        self.record(
            QuizGenerationEventKind::QuizFailed(QuizFailed {
                quiz_id,
                error_message,
            }),
            user_id,
            clock,
        );
        Ok(())
    }

    /// Checks that the stream is in `Processing` and returns its quiz id.
    fn guard_processing(&self, event_type: &str) -> Result<Uuid, DomainError> {
        match self.status {
            None => Err(DomainError::UnknownAggregate(self.id.clone())),
            Some(status) if status.is_terminal() => Err(DomainError::InvalidTransition {
                aggregate_id: self.id.clone(),
                status: status.to_string(),
                event_type: event_type.to_owned(),
            }),
            Some(_) => Ok(self
                .request
                .as_ref()
                .map(|r| r.quiz_id)
                .unwrap_or_default()),
        }
    }
}

impl AggregateRoot for QuizGeneration {
    type Event = QuizGenerationEvent;

    fn aggregate_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            QuizGenerationEventKind::QuizInitiated(request) => {
                self.status = Some(QuizStatus::Processing);
                self.initiated_at = Some(event.metadata.occurred_at);
                self.request = Some(request.clone());
            }
            QuizGenerationEventKind::QuizCompleted(completed) => {
                self.status = Some(QuizStatus::Completed);
                self.completed_at = Some(event.metadata.occurred_at);
                self.generated_question_count = Some(completed.question_count);
            }
            QuizGenerationEventKind::QuizFailed(failed) => {
                self.status = Some(QuizStatus::Failed);
                self.completed_at = Some(event.metadata.occurred_at);
                self.error_message = Some(failed.error_message.clone());
            }
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use lessonforge_core::event::DomainEvent;
    use lessonforge_test_support::FixedClock;

    use super::super::events::{
        QUIZ_COMPLETED_EVENT_TYPE, QUIZ_INITIATED_EVENT_TYPE,
    };
    use super::*;

    fn apply_uncommitted(quiz: &mut QuizGeneration) {
        let events: Vec<_> = quiz.uncommitted_events().to_vec();
        quiz.clear_uncommitted_events();
        for event in &events {
            quiz.apply(event);
        }
    }

    fn sample_request() -> QuizInitiated {
        QuizInitiated {
            quiz_id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
            level_id: Uuid::new_v4(),
            title: "Fractions basics".to_owned(),
            topic: "Fractions".to_owned(),
            grade_level: "Grade 5".to_owned(),
            question_count: 10,
            total_score: 100,
            duration_minutes: 30,
        }
    }

    #[test]
    fn test_initiate_produces_quiz_initiated_event() {
        // Arrange
        let fixed_now = Utc.with_ymd_and_hms(2026, 2, 3, 9, 0, 0).unwrap();
        let clock = FixedClock(fixed_now);
        let mut quiz = QuizGeneration::new("q1".to_owned());

        // Act
        quiz.initiate(sample_request(), None, &clock).unwrap();

        // Assert
        let events = quiz.uncommitted_events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_type(), QUIZ_INITIATED_EVENT_TYPE);
        assert_eq!(event.metadata.aggregate_id, "q1");
        assert_eq!(event.metadata.version, 1);
        assert_eq!(event.metadata.occurred_at, fixed_now);
    }

    #[test]
    fn test_initiate_twice_is_rejected() {
        // Arrange
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 2, 3, 9, 0, 0).unwrap());
        let mut quiz = QuizGeneration::new("q1".to_owned());
        quiz.initiate(sample_request(), None, &clock).unwrap();
        apply_uncommitted(&mut quiz);

        // Act
        let result = quiz.initiate(sample_request(), None, &clock);

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_complete_after_failure_is_invalid_transition() {
        // Arrange
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 2, 3, 9, 0, 0).unwrap());
        let mut quiz = QuizGeneration::new("q2".to_owned());
        quiz.initiate(sample_request(), None, &clock).unwrap();
        apply_uncommitted(&mut quiz);
        quiz.fail("timeout".to_owned(), None, &clock).unwrap();
        apply_uncommitted(&mut quiz);

        // Act
        let result = quiz.complete(10, None, &clock);

        // Assert
        match result.unwrap_err() {
            DomainError::InvalidTransition {
                aggregate_id,
                status,
                event_type,
            } => {
                assert_eq!(aggregate_id, "q2");
                assert_eq!(status, "Failed");
                assert_eq!(event_type, QUIZ_COMPLETED_EVENT_TYPE);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[test]
    fn test_apply_reconstructs_state_and_version() {
        // Arrange
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 2, 3, 9, 0, 0).unwrap());
        let request = sample_request();
        let mut source = QuizGeneration::new("q3".to_owned());
        source.initiate(request.clone(), None, &clock).unwrap();
        let mut events: Vec<_> = source.uncommitted_events().to_vec();
        apply_uncommitted(&mut source);
        source.complete(9, None, &clock).unwrap();
        events.extend(source.uncommitted_events().to_vec());

        // Act
        let mut replayed = QuizGeneration::new("q3".to_owned());
        for event in &events {
            replayed.apply(event);
        }

        // Assert
        assert_eq!(replayed.version(), 2);
        assert_eq!(replayed.status, Some(QuizStatus::Completed));
        assert_eq!(replayed.generated_question_count, Some(9));
        assert_eq!(replayed.request.as_ref().unwrap().topic, request.topic);
    }
}
