//! Message bus abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChronicleError;
use crate::event::{Event, Metadata};

/// Publishes committed events to subscribers.
///
/// Publishing is fire-and-forget from the runtime's point of view: it is
/// called once per committed save, and any error is returned to the caller
/// of the save as-is.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish the events committed for one aggregate.
    async fn publish(
        &self,
        id: &str,
        aggregate_type: &str,
        events: &[Event],
        metadata: &Metadata,
    ) -> Result<(), ChronicleError>;
}

/// One published batch, as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// Aggregate identity.
    pub id: String,
    /// Aggregate type name.
    pub aggregate_type: String,
    /// Committed events, oldest first.
    pub events: Vec<Event>,
    /// Metadata supplied at save time, merged with scope metadata.
    pub metadata: Metadata,
}

impl Publication {
    /// Copies a publish call into an owned value.
    #[must_use]
    pub fn new(id: &str, aggregate_type: &str, events: &[Event], metadata: &Metadata) -> Self {
        Self {
            id: id.to_owned(),
            aggregate_type: aggregate_type.to_owned(),
            events: events.to_vec(),
            metadata: metadata.clone(),
        }
    }
}
