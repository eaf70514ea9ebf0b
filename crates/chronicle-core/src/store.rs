//! Event store abstraction.
//!
//! Streams are keyed by aggregate type and identity. Only `read_stream` and
//! `append` are mandatory; the batch readers fall back to per-stream reads,
//! and the remaining methods report `CollaboratorUnimplemented` until a
//! backend provides them.

use async_trait::async_trait;

use crate::error::ChronicleError;
use crate::event::{Event, EventStream};

/// Storage collaborator for loading and appending events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Load the ordered history and current version of one stream. An
    /// unknown stream is returned empty at version 0.
    async fn read_stream(&self, id: &str, aggregate_type: &str)
    -> Result<EventStream, ChronicleError>;

    /// Load several streams of one type, in the order requested.
    ///
    /// Backends should override this to fetch everything in one round trip.
    async fn read_many(
        &self,
        ids: &[String],
        aggregate_type: &str,
    ) -> Result<Vec<EventStream>, ChronicleError> {
        let mut streams = Vec::with_capacity(ids.len());
        for id in ids {
            streams.push(self.read_stream(id, aggregate_type).await?);
        }
        Ok(streams)
    }

    /// Load every stream of one type.
    async fn read_streams_for_type(
        &self,
        aggregate_type: &str,
    ) -> Result<Vec<EventStream>, ChronicleError> {
        let ids = self.get_ids_for_type(aggregate_type).await?;
        self.read_many(&ids, aggregate_type).await
    }

    /// List every identity with history for one type.
    async fn get_ids_for_type(&self, _aggregate_type: &str) -> Result<Vec<String>, ChronicleError> {
        Err(ChronicleError::CollaboratorUnimplemented("get_ids_for_type"))
    }

    /// Append events to one stream with optimistic concurrency.
    /// `expected_version` is the version the writer loaded.
    async fn append(
        &self,
        id: &str,
        aggregate_type: &str,
        events: &[Event],
        expected_version: i64,
    ) -> Result<(), ChronicleError>;

    /// Start an atomic multi-stream transaction.
    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, ChronicleError> {
        Err(ChronicleError::CollaboratorUnimplemented("begin_transaction"))
    }
}

/// An open storage transaction.
///
/// Appends become visible only on [`StoreTransaction::commit`]. Dropping the
/// transaction without committing discards every append made through it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Stage an append, checked against `expected_version`.
    async fn append(
        &mut self,
        id: &str,
        aggregate_type: &str,
        events: &[Event],
        expected_version: i64,
    ) -> Result<(), ChronicleError>;

    /// Commit every staged append atomically.
    async fn commit(self: Box<Self>) -> Result<(), ChronicleError>;
}
