//! `PostgreSQL` implementation of the `EventStore` trait.
//!
//! Optimistic concurrency is enforced twice: a version check inside the
//! append transaction, and the `UNIQUE (aggregate_id, version)` constraint
//! as the arbiter for writers that raced past the check. Either way the
//! loser sees `ConcurrencyConflict` with the actual current version and the
//! transaction rolls back without persisting anything.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use lessonforge_core::error::DomainError;
use lessonforge_core::store::{EventRecord, EventStore, NewEvent};

/// PostgreSQL-backed event store.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_version(&self, aggregate_id: &str) -> Result<i64, DomainError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(version), 0) FROM quiz_generation_events WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_unavailable)
    }
}

fn storage_unavailable(error: sqlx::Error) -> DomainError {
    DomainError::StorageUnavailable(error.to_string())
}

fn record_from_row(row: &PgRow) -> Result<EventRecord, sqlx::Error> {
    Ok(EventRecord {
        event_id: row.try_get("event_id")?,
        aggregate_id: row.try_get("aggregate_id")?,
        aggregate_type: row.try_get("aggregate_type")?,
        event_type: row.try_get("event_type")?,
        event_data: row.try_get("event_data")?,
        version: row.try_get("version")?,
        occurred_at: row.try_get("occurred_at")?,
        created_at: row.try_get("created_at")?,
        global_position: row.try_get("global_position")?,
        user_id: row.try_get("user_id")?,
    })
}

const SELECT_COLUMNS: &str = "event_id, aggregate_id, aggregate_type, event_type, event_data, \
     version, occurred_at, created_at, global_position, user_id";

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(
        &self,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<EventRecord, DomainError> {
        let mut tx = self.pool.begin().await.map_err(storage_unavailable)?;

        let actual = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(version), 0) FROM quiz_generation_events WHERE aggregate_id = $1",
        )
        .bind(&event.aggregate_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_unavailable)?;

        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: event.aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let insert = sqlx::query(
            "INSERT INTO quiz_generation_events \
                 (event_id, aggregate_id, aggregate_type, event_type, event_data, \
                  version, occurred_at, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING event_id, aggregate_id, aggregate_type, event_type, event_data, \
                       version, occurred_at, created_at, global_position, user_id",
        )
        .bind(Uuid::new_v4())
        .bind(&event.aggregate_id)
        .bind(&event.aggregate_type)
        .bind(&event.event_type)
        .bind(&event.event_data)
        .bind(expected_version + 1)
        .bind(event.occurred_at)
        .bind(event.user_id)
        .fetch_one(&mut *tx)
        .await;

        let row = match insert {
            Ok(row) => row,
            Err(error) => {
                let unique_violation = error
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation());
                drop(tx);
                if unique_violation {
                    // A racing writer claimed the version between our check
                    // and the insert; report the fresh current version.
                    let actual = self.current_version(&event.aggregate_id).await?;
                    return Err(DomainError::ConcurrencyConflict {
                        aggregate_id: event.aggregate_id,
                        expected: expected_version,
                        actual,
                    });
                }
                return Err(storage_unavailable(error));
            }
        };

        let record = record_from_row(&row).map_err(storage_unavailable)?;
        tx.commit().await.map_err(storage_unavailable)?;

        tracing::trace!(
            aggregate_id = %record.aggregate_id,
            event_type = %record.event_type,
            version = record.version,
            "event appended"
        );
        Ok(record)
    }

    async fn read_stream(&self, aggregate_id: &str) -> Result<Vec<EventRecord>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM quiz_generation_events \
             WHERE aggregate_id = $1 ORDER BY version"
        ))
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        rows.iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_unavailable)
    }

    async fn read_all(
        &self,
        after_position: Option<i64>,
        limit: usize,
    ) -> Result<Vec<EventRecord>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM quiz_generation_events \
             WHERE global_position > $1 ORDER BY global_position LIMIT $2"
        ))
        .bind(after_position.unwrap_or(0))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        rows.iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_unavailable)
    }
}
