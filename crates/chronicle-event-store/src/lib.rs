//! Event store backends for the Chronicle runtime.

pub mod memory;
pub mod pg_event_store;
pub mod schema;

pub use memory::{InMemoryEventStore, InMemoryTransaction};
pub use pg_event_store::{PgEventStore, PgStoreTransaction};
