//! Event store database schema.

/// SQL to create the events table.
///
/// `UNIQUE (aggregate_id, version)` is what makes racing appends lose:
/// exactly one writer wins each version number. `global_position` is the
/// secondary ordering used by `read_all`.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS quiz_generation_events (
    event_id        UUID PRIMARY KEY,
    aggregate_id    VARCHAR(255) NOT NULL,
    aggregate_type  VARCHAR(255) NOT NULL,
    event_type      VARCHAR(255) NOT NULL,
    event_data      JSONB NOT NULL,
    version         BIGINT NOT NULL,
    occurred_at     TIMESTAMPTZ NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT CLOCK_TIMESTAMP(),
    global_position BIGSERIAL,
    user_id         UUID,
    UNIQUE (aggregate_id, version)
);

CREATE INDEX IF NOT EXISTS idx_quiz_generation_events_aggregate_id
    ON quiz_generation_events (aggregate_id, version);

CREATE INDEX IF NOT EXISTS idx_quiz_generation_events_global_position
    ON quiz_generation_events (global_position);
";
