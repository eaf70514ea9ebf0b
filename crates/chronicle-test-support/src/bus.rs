//! Test message buses — `MessageBus` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::bus::{MessageBus, Publication};
use chronicle_core::error::ChronicleError;
use chronicle_core::event::{Event, Metadata};

/// A message bus that records every publish call and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingMessageBus {
    published: Mutex<Vec<Publication>>,
}

impl RecordingMessageBus {
    /// Create an empty recording bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything published, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<Publication> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageBus for RecordingMessageBus {
    async fn publish(
        &self,
        id: &str,
        aggregate_type: &str,
        events: &[Event],
        metadata: &Metadata,
    ) -> Result<(), ChronicleError> {
        self.published
            .lock()
            .unwrap()
            .push(Publication::new(id, aggregate_type, events, metadata));
        Ok(())
    }
}

/// A message bus that always returns an infrastructure error.
#[derive(Debug)]
pub struct FailingMessageBus;

#[async_trait]
impl MessageBus for FailingMessageBus {
    async fn publish(
        &self,
        _id: &str,
        _aggregate_type: &str,
        _events: &[Event],
        _metadata: &Metadata,
    ) -> Result<(), ChronicleError> {
        Err(ChronicleError::Infrastructure("broker unavailable".into()))
    }
}
