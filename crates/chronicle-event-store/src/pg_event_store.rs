//! `PostgreSQL` implementation of the `EventStore` trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};

use chronicle_core::error::ChronicleError;
use chronicle_core::event::{Details, Event, EventStream, version_for};
use chronicle_core::store::{EventStore, StoreTransaction};

use crate::schema::CREATE_EVENTS_TABLE;

/// Environment variable holding the connection string.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

#[allow(clippy::needless_pass_by_value)]
fn infrastructure(err: sqlx::Error) -> ChronicleError {
    ChronicleError::Infrastructure(err.to_string())
}

fn decode_event(row: &PgRow) -> Result<Event, ChronicleError> {
    let name: String = row.try_get("name").map_err(infrastructure)?;
    let raw_details: String = row.try_get("details").map_err(infrastructure)?;
    let details: Details = serde_json::from_str(&raw_details)
        .map_err(|e| ChronicleError::Infrastructure(format!("corrupt details for {name}: {e}")))?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(infrastructure)?;
    Ok(Event::new(name, created_at, details))
}

fn stream_of(id: &str, events: Vec<Event>) -> Result<EventStream, ChronicleError> {
    let version = version_for(events.len())?;
    Ok(EventStream::new(id, events, version))
}

/// Groups rows ordered by `(aggregate_id, sequence_number)` into per-id
/// event lists.
fn group_rows(rows: &[PgRow]) -> Result<HashMap<String, Vec<Event>>, ChronicleError> {
    let mut grouped: HashMap<String, Vec<Event>> = HashMap::new();
    for row in rows {
        let id: String = row.try_get("aggregate_id").map_err(infrastructure)?;
        grouped.entry(id).or_default().push(decode_event(row)?);
    }
    Ok(grouped)
}

async fn current_version(
    conn: &mut PgConnection,
    id: &str,
    aggregate_type: &str,
) -> Result<i64, ChronicleError> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(MAX(sequence_number), 0)::BIGINT FROM chronicle_events \
         WHERE aggregate_type = $1 AND aggregate_id = $2",
    )
    .bind(aggregate_type)
    .bind(id)
    .fetch_one(&mut *conn)
    .await
    .map_err(infrastructure)
}

/// Appends within an open database transaction. A transaction-scoped
/// advisory lock serializes writers of the same stream, so the version read
/// here cannot change before the inserts land.
async fn append_in(
    conn: &mut PgConnection,
    id: &str,
    aggregate_type: &str,
    events: &[Event],
    expected_version: i64,
) -> Result<(), ChronicleError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || '/' || $2))")
        .bind(aggregate_type)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(infrastructure)?;

    let actual = current_version(conn, id, aggregate_type).await?;
    if actual != expected_version {
        return Err(ChronicleError::VersionConflict {
            aggregate_type: aggregate_type.to_owned(),
            id: id.to_owned(),
            expected: expected_version,
            actual,
        });
    }

    let mut sequence_number = expected_version;
    for event in events {
        sequence_number += 1;
        let details = serde_json::to_string(event.details())
            .map_err(|e| ChronicleError::Infrastructure(format!("unencodable details: {e}")))?;
        sqlx::query(
            "INSERT INTO chronicle_events \
             (aggregate_type, aggregate_id, sequence_number, name, details, created_at) \
             VALUES ($1, $2, $3, $4, $5::json, $6)",
        )
        .bind(aggregate_type)
        .bind(id)
        .bind(sequence_number)
        .bind(event.name())
        .bind(details)
        .bind(event.created_at())
        .execute(&mut *conn)
        .await
        .map_err(infrastructure)?;
    }

    tracing::debug!(
        aggregate_type,
        id,
        appended = events.len(),
        version = sequence_number,
        "appended events"
    );
    Ok(())
}

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

    /// Connects a pool of ten connections to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns `ChronicleError::Infrastructure` if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, ChronicleError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(infrastructure)?;
        Ok(Self::new(pool))
    }

    /// Connects using the `DATABASE_URL` environment variable.
    ///
    /// # Errors
    ///
    /// Returns `ChronicleError::Config` if the variable is unset, or
    /// `ChronicleError::Infrastructure` if the connection fails.
    pub async fn connect_from_env() -> Result<Self, ChronicleError> {
        let database_url = std::env::var(DATABASE_URL_VAR).map_err(|_| {
            ChronicleError::Config(format!("{DATABASE_URL_VAR} environment variable must be set"))
        })?;
        Self::connect(&database_url).await
    }

    /// Creates the events table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ChronicleError::Infrastructure` on database failure.
    pub async fn ensure_schema(&self) -> Result<(), ChronicleError> {
        sqlx::raw_sql(CREATE_EVENTS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn read_stream(
        &self,
        id: &str,
        aggregate_type: &str,
    ) -> Result<EventStream, ChronicleError> {
        let rows = sqlx::query(
            "SELECT name, details::text AS details, created_at FROM chronicle_events \
             WHERE aggregate_type = $1 AND aggregate_id = $2 \
             ORDER BY sequence_number",
        )
        .bind(aggregate_type)
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        let events = rows
            .iter()
            .map(decode_event)
            .collect::<Result<Vec<_>, _>>()?;
        stream_of(id, events)
    }

    async fn read_many(
        &self,
        ids: &[String],
        aggregate_type: &str,
    ) -> Result<Vec<EventStream>, ChronicleError> {
        let rows = sqlx::query(
            "SELECT aggregate_id, name, details::text AS details, created_at FROM chronicle_events \
             WHERE aggregate_type = $1 AND aggregate_id = ANY($2) \
             ORDER BY aggregate_id, sequence_number",
        )
        .bind(aggregate_type)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        let grouped = group_rows(&rows)?;
        ids.iter()
            .map(|id| stream_of(id, grouped.get(id).cloned().unwrap_or_default()))
            .collect()
    }

    async fn read_streams_for_type(
        &self,
        aggregate_type: &str,
    ) -> Result<Vec<EventStream>, ChronicleError> {
        let rows = sqlx::query(
            "SELECT aggregate_id, name, details::text AS details, created_at FROM chronicle_events \
             WHERE aggregate_type = $1 \
             ORDER BY aggregate_id, sequence_number",
        )
        .bind(aggregate_type)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        let mut order: Vec<String> = Vec::new();
        for row in &rows {
            let id: String = row.try_get("aggregate_id").map_err(infrastructure)?;
            if order.last() != Some(&id) {
                order.push(id);
            }
        }
        let mut grouped = group_rows(&rows)?;
        order
            .into_iter()
            .map(|id| {
                let events = grouped.remove(&id).unwrap_or_default();
                stream_of(&id, events)
            })
            .collect()
    }

    async fn get_ids_for_type(&self, aggregate_type: &str) -> Result<Vec<String>, ChronicleError> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT aggregate_id FROM chronicle_events \
             WHERE aggregate_type = $1 ORDER BY aggregate_id",
        )
        .bind(aggregate_type)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)
    }

    async fn append(
        &self,
        id: &str,
        aggregate_type: &str,
        events: &[Event],
        expected_version: i64,
    ) -> Result<(), ChronicleError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;
        append_in(&mut tx, id, aggregate_type, events, expected_version).await?;
        tx.commit().await.map_err(infrastructure)
    }

    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, ChronicleError> {
        let tx = self.pool.begin().await.map_err(infrastructure)?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }
}

/// Database transaction spanning several stream appends. Rolled back by
/// `sqlx` when dropped uncommitted.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PgStoreTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStoreTransaction").finish_non_exhaustive()
    }
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn append(
        &mut self,
        id: &str,
        aggregate_type: &str,
        events: &[Event],
        expected_version: i64,
    ) -> Result<(), ChronicleError> {
        append_in(&mut self.tx, id, aggregate_type, events, expected_version).await
    }

    async fn commit(self: Box<Self>) -> Result<(), ChronicleError> {
        self.tx.commit().await.map_err(infrastructure)
    }
}
