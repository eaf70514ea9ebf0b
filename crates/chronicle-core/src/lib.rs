//! Chronicle Core — shared event-sourcing abstractions.
//!
//! This crate defines the event data model, the static operation registry
//! every aggregate type declares, the error types, and the collaborator
//! traits (storage, message bus, identifiers, clock) the runtime depends on.
//! It contains no infrastructure code.

pub mod aggregate;
pub mod bus;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod id;
pub mod store;
