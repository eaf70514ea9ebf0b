//! Event store database schema.
//!
//! `details` is stored as `JSON` rather than `JSONB` so the parameter order
//! recorded at call time survives the round trip.

/// SQL to create the events table.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS chronicle_events (
    event_id        BIGSERIAL PRIMARY KEY,
    aggregate_type  VARCHAR(255) NOT NULL,
    aggregate_id    VARCHAR(255) NOT NULL,
    sequence_number BIGINT NOT NULL,
    name            VARCHAR(255) NOT NULL,
    details         JSON NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL,
    UNIQUE (aggregate_type, aggregate_id, sequence_number)
);

CREATE INDEX IF NOT EXISTS idx_chronicle_events_stream
    ON chronicle_events (aggregate_type, aggregate_id, sequence_number);
";
