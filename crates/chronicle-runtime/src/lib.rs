//! Chronicle Runtime — builds aggregates from their event history, records
//! commands as new events, and commits them through a unit of work.
//!
//! The usual flow is:
//!
//! 1. build a [`Chronicle`] from an event store and a message bus;
//! 2. open a [`UnitOfWork`], either immediate or scoped;
//! 3. find or create aggregates through it and [`AggregateHandle::invoke`]
//!    commands on them;
//! 4. save each handle; a scoped unit of work commits every save in one
//!    storage transaction when it is executed.

pub mod applicator;
pub mod args;
pub mod chronicle;
pub mod config;
pub mod handle;
pub mod loader;
mod repository;
pub mod save;
pub mod state;
pub mod unit_of_work;

pub use args::CallArgs;
pub use chronicle::{Chronicle, ChronicleBuilder};
pub use config::ChronicleConfig;
pub use handle::AggregateHandle;
pub use loader::AggregateLoader;
pub use save::{PendingSave, SaveReceipt};
pub use state::AggregateState;
pub use unit_of_work::UnitOfWork;
