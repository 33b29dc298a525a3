//! Shared test mocks and utilities for the Lessonforge quiz-generation
//! tracker.

mod clock;
mod store;

pub use clock::{FixedClock, SteppingClock};
pub use store::{EmptyEventStore, FailingEventStore, RecordingEventStore};
