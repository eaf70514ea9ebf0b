//! Error types.

use thiserror::Error;

/// Top-level error for loading, saving and collaborator failures.
#[derive(Debug, Error)]
pub enum ChronicleError {
    /// No history exists for the identity and creation was prohibited.
    #[error("aggregate not found: {aggregate_type}/{id}")]
    AggregateNotFound {
        /// Aggregate type name.
        aggregate_type: String,
        /// Aggregate identity.
        id: String,
    },

    /// Optimistic concurrency conflict at commit.
    #[error(
        "version conflict on {aggregate_type}/{id}: expected version {expected}, found {actual}"
    )]
    VersionConflict {
        /// Aggregate type name.
        aggregate_type: String,
        /// Aggregate identity.
        id: String,
        /// The version the writer saw when it captured its events.
        expected: i64,
        /// The version currently stored.
        actual: i64,
    },

    /// A collaborator method with no concrete backend was invoked.
    #[error("collaborator method not implemented: {0}")]
    CollaboratorUnimplemented(&'static str),

    /// The runtime was built without an event store.
    #[error("no event store configured")]
    UnsetEventStore,

    /// The runtime was built without a message bus.
    #[error("no message bus configured")]
    UnsetMessageBus,

    /// A stored event names no command of the aggregate type.
    #[error("unknown event {name} for aggregate type {aggregate_type}")]
    UnknownEvent {
        /// Aggregate type name.
        aggregate_type: &'static str,
        /// The event name found in the stream.
        name: String,
    },

    /// Domain logic rejected a historical event during replay.
    #[error("failed to replay event {event} onto {aggregate_type}/{id}: {source}")]
    Replay {
        /// Aggregate type name.
        aggregate_type: &'static str,
        /// Aggregate identity.
        id: String,
        /// The event name.
        event: String,
        /// The domain error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

/// A command call that cannot be recorded as an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventArgumentError {
    /// Continuations cannot be represented in the history.
    #[error("command {operation} does not accept a continuation")]
    ContinuationNotAllowed {
        /// The command name.
        operation: String,
    },

    /// Wrong number of positional arguments.
    #[error("{operation} takes {expected} positional arguments but {given} were given")]
    Arity {
        /// The operation name.
        operation: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        given: usize,
    },

    /// An option would overwrite a positional argument.
    #[error("option {key} of {operation} collides with a positional parameter")]
    DuplicateParameter {
        /// The operation name.
        operation: String,
        /// The colliding key.
        key: String,
    },
}

/// A recorded argument could not be decoded by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetailsError {
    /// The argument is absent from the details.
    #[error("missing argument: {0}")]
    Missing(String),

    /// The argument is present but has the wrong shape.
    #[error("invalid argument {name}: {reason}")]
    Invalid {
        /// The parameter name.
        name: String,
        /// Decoder message.
        reason: String,
    },
}

/// Error returned by invoking an operation on an aggregate handle.
///
/// Generic over `E`, the aggregate's domain error, which is passed through
/// unchanged.
#[derive(Debug, Error)]
pub enum InvokeError<E: std::error::Error + Send + Sync + 'static> {
    /// The call could not be recorded.
    #[error(transparent)]
    Argument(#[from] EventArgumentError),

    /// The aggregate type registers no operation with this name.
    #[error("unknown operation {operation} for aggregate type {aggregate_type}")]
    UnknownOperation {
        /// Aggregate type name.
        aggregate_type: &'static str,
        /// Requested operation.
        operation: String,
    },

    /// Domain logic rejected the call.
    #[error(transparent)]
    Domain(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("insufficient funds")]
    struct TestDomainError;

    #[test]
    fn test_version_conflict_display() {
        let err = ChronicleError::VersionConflict {
            aggregate_type: "Account".to_owned(),
            id: "acct-1".to_owned(),
            expected: 2,
            actual: 3,
        };

        assert_eq!(
            err.to_string(),
            "version conflict on Account/acct-1: expected version 2, found 3"
        );
    }

    #[test]
    fn test_invoke_error_domain_displays_inner() {
        let err: InvokeError<TestDomainError> = InvokeError::Domain(TestDomainError);

        assert_eq!(err.to_string(), "insufficient funds");
    }

    #[test]
    fn test_invoke_error_from_argument_error() {
        let err: InvokeError<TestDomainError> = EventArgumentError::ContinuationNotAllowed {
            operation: "rename".to_owned(),
        }
        .into();

        assert!(matches!(
            err,
            InvokeError::Argument(EventArgumentError::ContinuationNotAllowed { .. })
        ));
        assert_eq!(err.to_string(), "command rename does not accept a continuation");
    }

    #[test]
    fn test_replay_error_exposes_source() {
        let err = ChronicleError::Replay {
            aggregate_type: "Account",
            id: "acct-1".to_owned(),
            event: "withdraw".to_owned(),
            source: Box::new(TestDomainError),
        };

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "insufficient funds");
    }
}
