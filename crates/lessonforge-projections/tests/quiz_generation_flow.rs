//! End-to-end tests for the quiz-generation tracker: append through the
//! command handlers, project through the engine, query the read models.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use lessonforge_core::aggregate::AggregateRoot;
use lessonforge_core::error::DomainError;
use lessonforge_core::store::EventStore;
use lessonforge_event_store::InMemoryEventStore;
use lessonforge_projections::ProjectionEngine;
use lessonforge_quiz_generation::application::command_handlers::{
    handle_complete_quiz_generation, handle_fail_quiz_generation,
    handle_initiate_quiz_generation, reconstruct, reconstruct_existing,
};
use lessonforge_quiz_generation::domain::aggregates::QuizStatus;
use lessonforge_quiz_generation::domain::commands::{
    CompleteQuizGeneration, FailQuizGeneration, InitiateQuizGeneration,
};
use lessonforge_quiz_generation::domain::events::QuizInitiated;
use lessonforge_test_support::SteppingClock;

fn sample_request(topic: &str) -> QuizInitiated {
    QuizInitiated {
        quiz_id: Uuid::new_v4(),
        teacher_id: Uuid::new_v4(),
        level_id: Uuid::new_v4(),
        title: format!("{topic} quiz"),
        topic: topic.to_owned(),
        grade_level: "Grade 5".to_owned(),
        question_count: 10,
        total_score: 100,
        duration_minutes: 30,
    }
}

fn stepping_clock() -> SteppingClock {
    SteppingClock::new(
        Utc.with_ymd_and_hms(2026, 2, 3, 9, 0, 0).unwrap(),
        Duration::seconds(30),
    )
}

fn initiate(aggregate_id: &str, topic: &str) -> InitiateQuizGeneration {
    InitiateQuizGeneration {
        aggregate_id: aggregate_id.to_owned(),
        request: sample_request(topic),
        user_id: None,
    }
}

#[tokio::test]
async fn test_initiated_stream_projects_processing_row() {
    // Arrange: Scenario A.
    let store = Arc::new(InMemoryEventStore::new());
    let engine = ProjectionEngine::new(store.clone());
    let clock = stepping_clock();

    // Act
    handle_initiate_quiz_generation(&initiate("q1", "Fractions"), &clock, store.as_ref())
        .await
        .unwrap();
    engine.catch_up().await.unwrap();

    // Assert
    let row = engine.get_quiz("q1").unwrap();
    assert_eq!(row.status, QuizStatus::Processing);
    assert_eq!(row.version, 1);

    // A second initiation of the same stream carries expected_version 0
    // again and must lose.
    let result =
        handle_initiate_quiz_generation(&initiate("q1", "Fractions"), &clock, store.as_ref())
            .await;
    match result.unwrap_err() {
        DomainError::ConcurrencyConflict {
            aggregate_id,
            expected,
            actual,
        } => {
            assert_eq!(aggregate_id, "q1");
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_completed_stream_updates_statistics() {
    // Arrange: Scenario B.
    let store = Arc::new(InMemoryEventStore::new());
    let engine = ProjectionEngine::new(store.clone());
    let clock = stepping_clock();

    // Act
    handle_initiate_quiz_generation(&initiate("q1", "Fractions"), &clock, store.as_ref())
        .await
        .unwrap();
    handle_complete_quiz_generation(
        &CompleteQuizGeneration {
            aggregate_id: "q1".to_owned(),
            question_count: 10,
            user_id: None,
        },
        &clock,
        store.as_ref(),
    )
    .await
    .unwrap();
    engine.catch_up().await.unwrap();

    // Assert
    let stats = engine.statistics();
    assert_eq!(stats.total_initiated, 1);
    assert_eq!(stats.total_completed, 1);
    assert!((stats.success_rate() - 1.0).abs() < f64::EPSILON);
    assert_eq!(stats.total_questions_generated, 10);
    assert_eq!(stats.min_duration_ms, Some(30_000));
    assert_eq!(stats.max_duration_ms, Some(30_000));

    let row = engine.get_quiz("q1").unwrap();
    assert!(row.is_completed());
    assert_eq!(row.processing_duration(), Some(Duration::seconds(30)));
}

#[tokio::test]
async fn test_failed_stream_is_terminal() {
    // Arrange: Scenario C.
    let store = Arc::new(InMemoryEventStore::new());
    let engine = ProjectionEngine::new(store.clone());
    let clock = stepping_clock();

    handle_initiate_quiz_generation(&initiate("q2", "Decimals"), &clock, store.as_ref())
        .await
        .unwrap();
    handle_fail_quiz_generation(
        &FailQuizGeneration {
            aggregate_id: "q2".to_owned(),
            error_message: "timeout".to_owned(),
            user_id: None,
        },
        &clock,
        store.as_ref(),
    )
    .await
    .unwrap();
    engine.catch_up().await.unwrap();

    // Act: completing a failed stream is rejected at command time.
    let result = handle_complete_quiz_generation(
        &CompleteQuizGeneration {
            aggregate_id: "q2".to_owned(),
            question_count: 10,
            user_id: None,
        },
        &clock,
        store.as_ref(),
    )
    .await;

    // Assert
    assert!(matches!(
        result.unwrap_err(),
        DomainError::InvalidTransition { .. }
    ));
    let row = engine.get_quiz("q2").unwrap();
    assert_eq!(row.status, QuizStatus::Failed);
    assert!(row.is_failed());
    assert_eq!(row.error_message.as_deref(), Some("timeout"));
    assert_eq!(engine.statistics().total_failed, 1);
}

#[tokio::test]
async fn test_racing_initiations_produce_exactly_one_winner() {
    // Arrange: Scenario D.
    let store = Arc::new(InMemoryEventStore::new());
    let clock = Arc::new(stepping_clock());

    // Act: two writers race on expected_version 0.
    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = store.clone();
        let clock = clock.clone();
        handles.push(tokio::spawn(async move {
            handle_initiate_quiz_generation(&initiate("q3", "Algebra"), clock.as_ref(), store.as_ref())
                .await
        }));
    }
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    // Assert
    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let loser = outcomes
        .into_iter()
        .find_map(Result::err)
        .expect("one writer must lose");
    match loser {
        DomainError::ConcurrencyConflict {
            expected, actual, ..
        } => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
    let stream = store.read_stream("q3").await.unwrap();
    assert_eq!(stream.len(), 1);
    assert_eq!(stream[0].version, 1);
}

#[tokio::test]
async fn test_reconstruction_round_trips_through_the_store() {
    // Arrange
    let store = Arc::new(InMemoryEventStore::new());
    let clock = stepping_clock();
    let command = initiate("q1", "Fractions");
    let request = command.request.clone();

    handle_initiate_quiz_generation(&command, &clock, store.as_ref())
        .await
        .unwrap();
    handle_complete_quiz_generation(
        &CompleteQuizGeneration {
            aggregate_id: "q1".to_owned(),
            question_count: 9,
            user_id: None,
        },
        &clock,
        store.as_ref(),
    )
    .await
    .unwrap();

    // Act: replay the stream through the reconstructor.
    let quiz = reconstruct("q1", store.as_ref()).await.unwrap();

    // Assert: the folded state equals what the appended events describe.
    assert_eq!(quiz.version(), 2);
    assert_eq!(quiz.status, Some(QuizStatus::Completed));
    assert_eq!(quiz.request.as_ref().unwrap(), &request);
    assert_eq!(quiz.generated_question_count, Some(9));

    // An empty stream reconstructs to the defined initial state.
    let fresh = reconstruct("missing", store.as_ref()).await.unwrap();
    assert_eq!(fresh.version(), 0);
    assert_eq!(fresh.status, None);
    assert!(matches!(
        reconstruct_existing("missing", store.as_ref())
            .await
            .unwrap_err(),
        DomainError::UnknownAggregate(_)
    ));
}

#[tokio::test]
async fn test_rebuild_is_deterministic_and_matches_incremental() {
    // Arrange
    let store = Arc::new(InMemoryEventStore::new());
    let engine = ProjectionEngine::new(store.clone());
    let clock = stepping_clock();

    for (id, topic) in [("q1", "Fractions"), ("q2", "Decimals"), ("q3", "Algebra")] {
        handle_initiate_quiz_generation(&initiate(id, topic), &clock, store.as_ref())
            .await
            .unwrap();
    }
    handle_complete_quiz_generation(
        &CompleteQuizGeneration {
            aggregate_id: "q1".to_owned(),
            question_count: 9,
            user_id: None,
        },
        &clock,
        store.as_ref(),
    )
    .await
    .unwrap();
    handle_fail_quiz_generation(
        &FailQuizGeneration {
            aggregate_id: "q2".to_owned(),
            error_message: "model error".to_owned(),
            user_id: None,
        },
        &clock,
        store.as_ref(),
    )
    .await
    .unwrap();

    engine.catch_up().await.unwrap();
    let incremental = engine.snapshot();

    // Act
    engine.rebuild_all().await.unwrap();
    let first_rebuild = engine.snapshot();
    engine.rebuild_all().await.unwrap();
    let second_rebuild = engine.snapshot();

    // Assert
    assert_eq!(first_rebuild, second_rebuild);
    assert_eq!(first_rebuild, incremental);
    assert!(engine.check_consistency().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_catch_up_resumes_after_rebuild_with_concurrent_appends() {
    // Arrange
    let store = Arc::new(InMemoryEventStore::new());
    let engine = ProjectionEngine::new(store.clone());
    let clock = stepping_clock();

    handle_initiate_quiz_generation(&initiate("q1", "Fractions"), &clock, store.as_ref())
        .await
        .unwrap();
    engine.rebuild_all().await.unwrap();

    // Act: an append lands after the rebuild's scan finished.
    handle_initiate_quiz_generation(&initiate("q2", "Decimals"), &clock, store.as_ref())
        .await
        .unwrap();
    let drift_before = engine.check_consistency().await.unwrap();
    let processed = engine.catch_up().await.unwrap();

    // Assert: nothing was permanently skipped.
    assert!(drift_before.is_empty());
    assert_eq!(processed, 1);
    assert!(engine.get_quiz("q2").is_some());
    assert_eq!(engine.statistics().total_initiated, 2);
}
