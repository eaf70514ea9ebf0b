//! Test event stores — `EventStore` implementations for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chronicle_core::error::ChronicleError;
use chronicle_core::event::{Event, EventStream};
use chronicle_core::store::{EventStore, StoreTransaction};
use chronicle_event_store::InMemoryEventStore;

/// One committed append, as observed by [`RecordingEventStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct AppendCall {
    /// Aggregate identity.
    pub id: String,
    /// Aggregate type name.
    pub aggregate_type: String,
    /// Appended events.
    pub events: Vec<Event>,
    /// Expected version passed by the writer.
    pub expected_version: i64,
}

#[derive(Debug, Default)]
struct Log {
    appends: Vec<AppendCall>,
    stream_reads: usize,
    batch_reads: usize,
    transactions_begun: usize,
    transactions_committed: usize,
}

/// An in-memory event store that records every committed append and counts
/// reads and transactions. Appends made inside a transaction are recorded
/// only once it commits.
#[derive(Debug, Clone, Default)]
pub struct RecordingEventStore {
    inner: InMemoryEventStore,
    log: Arc<Mutex<Log>>,
}

impl RecordingEventStore {
    /// Create an empty recording store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write history directly, without recording it.
    ///
    /// # Panics
    ///
    /// Panics if the stream already has history.
    pub async fn seed(&self, id: &str, aggregate_type: &str, events: &[Event]) {
        self.inner
            .append(id, aggregate_type, events, 0)
            .await
            .unwrap();
    }

    /// Returns a snapshot of all committed appends, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appends(&self) -> Vec<AppendCall> {
        self.log.lock().unwrap().appends.clone()
    }

    /// Number of `read_stream` calls served.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn stream_reads(&self) -> usize {
        self.log.lock().unwrap().stream_reads
    }

    /// Number of `read_many` and `read_streams_for_type` calls served.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn batch_reads(&self) -> usize {
        self.log.lock().unwrap().batch_reads
    }

    /// Number of transactions opened.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn transactions_begun(&self) -> usize {
        self.log.lock().unwrap().transactions_begun
    }

    /// Number of transactions committed.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn transactions_committed(&self) -> usize {
        self.log.lock().unwrap().transactions_committed
    }

    /// Total events committed across all streams, seeded ones included.
    pub async fn event_count(&self) -> usize {
        self.inner.event_count().await
    }
}

#[async_trait]
impl EventStore for RecordingEventStore {
    async fn read_stream(
        &self,
        id: &str,
        aggregate_type: &str,
    ) -> Result<EventStream, ChronicleError> {
        self.log.lock().unwrap().stream_reads += 1;
        self.inner.read_stream(id, aggregate_type).await
    }

    async fn read_many(
        &self,
        ids: &[String],
        aggregate_type: &str,
    ) -> Result<Vec<EventStream>, ChronicleError> {
        self.log.lock().unwrap().batch_reads += 1;
        self.inner.read_many(ids, aggregate_type).await
    }

    async fn read_streams_for_type(
        &self,
        aggregate_type: &str,
    ) -> Result<Vec<EventStream>, ChronicleError> {
        self.log.lock().unwrap().batch_reads += 1;
        self.inner.read_streams_for_type(aggregate_type).await
    }

    async fn get_ids_for_type(&self, aggregate_type: &str) -> Result<Vec<String>, ChronicleError> {
        self.inner.get_ids_for_type(aggregate_type).await
    }

    async fn append(
        &self,
        id: &str,
        aggregate_type: &str,
        events: &[Event],
        expected_version: i64,
    ) -> Result<(), ChronicleError> {
        self.inner
            .append(id, aggregate_type, events, expected_version)
            .await?;
        self.log.lock().unwrap().appends.push(AppendCall {
            id: id.to_owned(),
            aggregate_type: aggregate_type.to_owned(),
            events: events.to_vec(),
            expected_version,
        });
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, ChronicleError> {
        let inner = self.inner.begin_transaction().await?;
        self.log.lock().unwrap().transactions_begun += 1;
        Ok(Box::new(RecordingTransaction {
            inner,
            log: Arc::clone(&self.log),
            staged: Vec::new(),
        }))
    }
}

struct RecordingTransaction {
    inner: Box<dyn StoreTransaction>,
    log: Arc<Mutex<Log>>,
    staged: Vec<AppendCall>,
}

#[async_trait]
impl StoreTransaction for RecordingTransaction {
    async fn append(
        &mut self,
        id: &str,
        aggregate_type: &str,
        events: &[Event],
        expected_version: i64,
    ) -> Result<(), ChronicleError> {
        self.inner
            .append(id, aggregate_type, events, expected_version)
            .await?;
        self.staged.push(AppendCall {
            id: id.to_owned(),
            aggregate_type: aggregate_type.to_owned(),
            events: events.to_vec(),
            expected_version,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), ChronicleError> {
        let Self { inner, log, staged } = *self;
        inner.commit().await?;
        let mut log = log.lock().unwrap();
        log.appends.extend(staged);
        log.transactions_committed += 1;
        Ok(())
    }
}

/// An event store that implements only the two required methods. Reads
/// return empty streams and appends are accepted and discarded, so every
/// defaulted method shows its fallback behavior.
#[derive(Debug)]
pub struct BareEventStore;

#[async_trait]
impl EventStore for BareEventStore {
    async fn read_stream(
        &self,
        id: &str,
        _aggregate_type: &str,
    ) -> Result<EventStream, ChronicleError> {
        Ok(EventStream::empty(id))
    }

    async fn append(
        &self,
        _id: &str,
        _aggregate_type: &str,
        _events: &[Event],
        _expected_version: i64,
    ) -> Result<(), ChronicleError> {
        Ok(())
    }
}

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

fn refused() -> ChronicleError {
    ChronicleError::Infrastructure("connection refused".into())
}

#[async_trait]
impl EventStore for FailingEventStore {
    async fn read_stream(
        &self,
        _id: &str,
        _aggregate_type: &str,
    ) -> Result<EventStream, ChronicleError> {
        Err(refused())
    }

    async fn read_many(
        &self,
        _ids: &[String],
        _aggregate_type: &str,
    ) -> Result<Vec<EventStream>, ChronicleError> {
        Err(refused())
    }

    async fn read_streams_for_type(
        &self,
        _aggregate_type: &str,
    ) -> Result<Vec<EventStream>, ChronicleError> {
        Err(refused())
    }

    async fn append(
        &self,
        _id: &str,
        _aggregate_type: &str,
        _events: &[Event],
        _expected_version: i64,
    ) -> Result<(), ChronicleError> {
        Err(refused())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, ChronicleError> {
        Err(refused())
    }
}
