//! Message bus backends for the Chronicle runtime.

pub mod broadcast;

pub use broadcast::BroadcastMessageBus;
