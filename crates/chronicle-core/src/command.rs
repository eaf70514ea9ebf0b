//! Command abstractions.

use uuid::Uuid;

use crate::event::Metadata;

/// Trait that application-level commands implement.
///
/// A command handler turns one of these into operation calls on an
/// aggregate handle, then saves the handle with [`Command::metadata`] so
/// subscribers can trace the published events back to the request.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// Metadata published with the events this command produced.
    fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("command_type".to_owned(), self.command_type().into());
        metadata.insert(
            "correlation_id".to_owned(),
            self.correlation_id().to_string().into(),
        );
        metadata
    }
}
