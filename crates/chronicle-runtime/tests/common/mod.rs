//! Shared helpers for runtime integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use chronicle_core::event::{Details, Event};
use chronicle_runtime::{Chronicle, ChronicleConfig};
use chronicle_test_support::{
    FixedClock, RecordingEventStore, RecordingMessageBus, SequenceIdGenerator, init_test_tracing,
};

/// Fixed timestamp used for every recorded command.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// A runtime wired to recording doubles.
pub struct Harness {
    pub store: Arc<RecordingEventStore>,
    pub bus: Arc<RecordingMessageBus>,
    pub chronicle: Chronicle,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ChronicleConfig::default())
    }

    pub fn with_config(config: ChronicleConfig) -> Self {
        init_test_tracing();
        let store = Arc::new(RecordingEventStore::new());
        let bus = Arc::new(RecordingMessageBus::new());
        let chronicle = Chronicle::builder()
            .event_store(store.clone())
            .message_bus(bus.clone())
            .id_generator(Arc::new(SequenceIdGenerator::new("acct")))
            .clock(Arc::new(FixedClock(now())))
            .config(config)
            .build()
            .unwrap();
        Self {
            store,
            bus,
            chronicle,
        }
    }
}

/// Build a historical event one hour before [`now`].
pub fn historical(name: &str, key: &str, value: serde_json::Value) -> Event {
    let mut details = Details::new();
    details.insert(key.to_owned(), value);
    Event::new(name, now() - chrono::Duration::hours(1), details)
}
