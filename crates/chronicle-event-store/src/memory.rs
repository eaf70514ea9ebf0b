//! In-memory event store for tests and local development.
//!
//! Enforces optimistic concurrency per `(type, id)` stream. Transactions
//! stage their appends privately and validate them all again under the
//! write lock at commit, so a batch is applied entirely or not at all.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use chronicle_core::error::ChronicleError;
use chronicle_core::event::{Event, EventStream, version_for};
use chronicle_core::store::{EventStore, StoreTransaction};

type StreamKey = (String, String);

fn key(aggregate_type: &str, id: &str) -> StreamKey {
    (aggregate_type.to_owned(), id.to_owned())
}

#[derive(Debug, Default)]
struct Streams {
    events: HashMap<StreamKey, Vec<Event>>,
    // First-append order per type.
    ids_by_type: HashMap<String, Vec<String>>,
}

impl Streams {
    fn current_version(&self, aggregate_type: &str, id: &str) -> Result<i64, ChronicleError> {
        self.events
            .get(&key(aggregate_type, id))
            .map_or(Ok(0), |events| version_for(events.len()))
    }

    fn stream(&self, aggregate_type: &str, id: &str) -> Result<EventStream, ChronicleError> {
        let events = self
            .events
            .get(&key(aggregate_type, id))
            .cloned()
            .unwrap_or_default();
        let version = version_for(events.len())?;
        Ok(EventStream::new(id, events, version))
    }

    fn push(&mut self, aggregate_type: &str, id: &str, events: &[Event]) {
        let stream = self.events.entry(key(aggregate_type, id)).or_default();
        if stream.is_empty() && !events.is_empty() {
            self.ids_by_type
                .entry(aggregate_type.to_owned())
                .or_default()
                .push(id.to_owned());
        }
        stream.extend_from_slice(events);
    }
}

fn conflict(aggregate_type: &str, id: &str, expected: i64, actual: i64) -> ChronicleError {
    ChronicleError::VersionConflict {
        aggregate_type: aggregate_type.to_owned(),
        id: id.to_owned(),
        expected,
        actual,
    }
}

/// Event store backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<Streams>>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of events committed across all streams.
    pub async fn event_count(&self) -> usize {
        self.streams.read().await.events.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn read_stream(
        &self,
        id: &str,
        aggregate_type: &str,
    ) -> Result<EventStream, ChronicleError> {
        self.streams.read().await.stream(aggregate_type, id)
    }

    async fn read_many(
        &self,
        ids: &[String],
        aggregate_type: &str,
    ) -> Result<Vec<EventStream>, ChronicleError> {
        let streams = self.streams.read().await;
        ids.iter()
            .map(|id| streams.stream(aggregate_type, id))
            .collect()
    }

    async fn read_streams_for_type(
        &self,
        aggregate_type: &str,
    ) -> Result<Vec<EventStream>, ChronicleError> {
        let streams = self.streams.read().await;
        match streams.ids_by_type.get(aggregate_type) {
            Some(ids) => ids
                .iter()
                .map(|id| streams.stream(aggregate_type, id))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    async fn get_ids_for_type(&self, aggregate_type: &str) -> Result<Vec<String>, ChronicleError> {
        Ok(self
            .streams
            .read()
            .await
            .ids_by_type
            .get(aggregate_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(
        &self,
        id: &str,
        aggregate_type: &str,
        events: &[Event],
        expected_version: i64,
    ) -> Result<(), ChronicleError> {
        let mut streams = self.streams.write().await;
        let actual = streams.current_version(aggregate_type, id)?;
        if actual != expected_version {
            return Err(conflict(aggregate_type, id, expected_version, actual));
        }
        let appended = version_for(events.len())?;
        streams.push(aggregate_type, id, events);
        tracing::debug!(
            aggregate_type,
            id,
            appended,
            version = actual + appended,
            "appended events"
        );
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, ChronicleError> {
        Ok(Box::new(InMemoryTransaction {
            streams: Arc::clone(&self.streams),
            staged: Vec::new(),
        }))
    }
}

#[derive(Debug)]
struct StagedAppend {
    aggregate_type: String,
    id: String,
    events: Vec<Event>,
    expected_version: i64,
}

/// Transaction over an [`InMemoryEventStore`].
#[derive(Debug)]
pub struct InMemoryTransaction {
    streams: Arc<RwLock<Streams>>,
    staged: Vec<StagedAppend>,
}

impl InMemoryTransaction {
    fn staged_len(&self, aggregate_type: &str, id: &str) -> Result<i64, ChronicleError> {
        self.staged
            .iter()
            .filter(|s| s.aggregate_type == aggregate_type && s.id == id)
            .map(|s| version_for(s.events.len()))
            .sum()
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn append(
        &mut self,
        id: &str,
        aggregate_type: &str,
        events: &[Event],
        expected_version: i64,
    ) -> Result<(), ChronicleError> {
        let committed = self
            .streams
            .read()
            .await
            .current_version(aggregate_type, id)?;
        let actual = committed + self.staged_len(aggregate_type, id)?;
        if actual != expected_version {
            return Err(conflict(aggregate_type, id, expected_version, actual));
        }
        self.staged.push(StagedAppend {
            aggregate_type: aggregate_type.to_owned(),
            id: id.to_owned(),
            events: events.to_vec(),
            expected_version,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), ChronicleError> {
        let mut streams = self.streams.write().await;

        // Validate the whole batch before touching any stream.
        let mut versions: HashMap<StreamKey, i64> = HashMap::new();
        for staged in &self.staged {
            let stream_key = key(&staged.aggregate_type, &staged.id);
            let current = match versions.get(&stream_key) {
                Some(version) => *version,
                None => streams.current_version(&staged.aggregate_type, &staged.id)?,
            };
            if current != staged.expected_version {
                return Err(conflict(
                    &staged.aggregate_type,
                    &staged.id,
                    staged.expected_version,
                    current,
                ));
            }
            versions.insert(stream_key, current + version_for(staged.events.len())?);
        }

        for staged in &self.staged {
            streams.push(&staged.aggregate_type, &staged.id, &staged.events);
        }
        tracing::debug!(appends = self.staged.len(), "committed transaction");
        Ok(())
    }
}
