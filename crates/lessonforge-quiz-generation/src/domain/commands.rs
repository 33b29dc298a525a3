//! Commands for the Quiz Generation context.

use lessonforge_core::command::Command;
use uuid::Uuid;

use super::events::QuizInitiated;

/// Command to accept a quiz-generation request and start tracking it.
#[derive(Debug, Clone)]
pub struct InitiateQuizGeneration {
    /// The stream to create.
    pub aggregate_id: String,
    /// Details of the requested quiz.
    pub request: QuizInitiated,
    /// The acting user, if known.
    pub user_id: Option<Uuid>,
}

impl Command for InitiateQuizGeneration {
    fn command_type(&self) -> &'static str {
        "quiz_generation.initiate"
    }

    fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }
}

/// Command to record that generation finished successfully.
#[derive(Debug, Clone)]
pub struct CompleteQuizGeneration {
    /// The stream to update.
    pub aggregate_id: String,
    /// Number of questions actually generated.
    pub question_count: i32,
    /// The acting user, if known.
    pub user_id: Option<Uuid>,
}

impl Command for CompleteQuizGeneration {
    fn command_type(&self) -> &'static str {
        "quiz_generation.complete"
    }

    fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }
}

/// Command to record that generation failed.
#[derive(Debug, Clone)]
pub struct FailQuizGeneration {
    /// The stream to update.
    pub aggregate_id: String,
    /// Human-readable failure reason.
    pub error_message: String,
    /// The acting user, if known.
    pub user_id: Option<Uuid>,
}

impl Command for FailQuizGeneration {
    fn command_type(&self) -> &'static str {
        "quiz_generation.fail"
    }

    fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }
}
