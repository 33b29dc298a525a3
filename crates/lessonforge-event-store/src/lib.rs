//! Event store implementations.
//!
//! Two implementations of the `lessonforge-core` [`EventStore`] trait:
//! an in-memory store for tests and single-process deployments, and a
//! PostgreSQL-backed store for durable persistence. Both enforce the same
//! contract: per-aggregate versions are exactly `1..=N` with no gaps, and a
//! failed append persists nothing.
//!
//! [`EventStore`]: lessonforge_core::store::EventStore

pub mod memory;
pub mod pg_event_store;
pub mod schema;

pub use memory::InMemoryEventStore;
pub use pg_event_store::PgEventStore;
