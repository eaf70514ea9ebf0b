//! Chronicle Inventory — an inventory bounded context on the Chronicle
//! runtime.
//!
//! Tracks item quantities and which items are equipped, and shows how an
//! application layer drives aggregates through a unit of work.

pub mod application;
pub mod domain;
