//! Shared test doubles and utilities for the Chronicle runtime.

mod account;
mod bus;
mod clock;
mod ids;
mod logging;
mod store;

pub use account::{Account, AccountError};
pub use bus::{FailingMessageBus, RecordingMessageBus};
pub use clock::{FixedClock, SteppingClock};
pub use ids::SequenceIdGenerator;
pub use logging::init_test_tracing;
pub use store::{AppendCall, BareEventStore, FailingEventStore, RecordingEventStore};
