//! Fan-out of committed events over a `tokio` broadcast channel.
//!
//! Every subscriber receives every [`Publication`] sent after it subscribed.
//! A subscriber that falls more than `capacity` publications behind loses
//! the oldest ones and observes `RecvError::Lagged`.

use async_trait::async_trait;
use tokio::sync::broadcast;

use chronicle_core::bus::{MessageBus, Publication};
use chronicle_core::error::ChronicleError;
use chronicle_core::event::{Event, Metadata};

/// Default number of publications buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

/// In-process message bus.
#[derive(Debug, Clone)]
pub struct BroadcastMessageBus {
    sender: broadcast::Sender<Publication>,
}

impl BroadcastMessageBus {
    /// Creates a bus buffering up to `capacity` publications per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Registers a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Publication> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastMessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl MessageBus for BroadcastMessageBus {
    async fn publish(
        &self,
        id: &str,
        aggregate_type: &str,
        events: &[Event],
        metadata: &Metadata,
    ) -> Result<(), ChronicleError> {
        let publication = Publication::new(id, aggregate_type, events, metadata);
        match self.sender.send(publication) {
            Ok(receivers) => {
                tracing::debug!(
                    aggregate_type,
                    id,
                    events = events.len(),
                    receivers,
                    "published"
                );
            }
            // No subscriber is listening; the publication is simply dropped.
            Err(_) => {
                tracing::debug!(
                    aggregate_type,
                    id,
                    events = events.len(),
                    "published with no subscribers"
                );
            }
        }
        Ok(())
    }
}
