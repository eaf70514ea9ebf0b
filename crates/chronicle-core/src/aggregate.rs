//! Aggregate abstraction and the per-type operation registry.
//!
//! Every aggregate type declares, once and statically, which of its
//! operations are commands (recorded as events) and which are queries
//! (passed straight through). Command handlers receive the recorded
//! details and the event timestamp, so a live call and a later replay see
//! exactly the same input.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::DetailsError;
use crate::event::Details;

/// Handler for a command: mutates the domain state.
pub type CommandFn<A> =
    fn(&mut A, &OperationInput<'_>) -> Result<(), <A as Aggregate>::Error>;

/// Handler for a query: reads the domain state.
pub type QueryFn<A> =
    fn(&A, &OperationInput<'_>) -> Result<serde_json::Value, <A as Aggregate>::Error>;

/// Trait for domain state reconstituted from event history.
pub trait Aggregate: Default + Send + Sync + 'static {
    /// Type name used to key streams in the event store.
    const AGGREGATE_TYPE: &'static str;

    /// Domain error raised by command and query handlers.
    type Error: std::error::Error + From<DetailsError> + Send + Sync + 'static;

    /// The dispatch table for this type.
    fn operations() -> &'static [Operation<Self>];

    /// Looks up an operation by name.
    fn operation(name: &str) -> Option<&'static Operation<Self>> {
        Self::operations().iter().find(|operation| operation.name() == name)
    }

    /// Returns `true` if `name` is a registered command.
    fn is_command(name: &str) -> bool {
        Self::operation(name).is_some_and(Operation::is_command)
    }
}

/// What an operation does when invoked.
pub enum OperationKind<A: Aggregate> {
    /// Recorded as an event, then applied.
    Command(CommandFn<A>),
    /// Evaluated against the current state with no bookkeeping.
    Query(QueryFn<A>),
}

/// One entry of an aggregate's dispatch table.
pub struct Operation<A: Aggregate> {
    name: &'static str,
    params: &'static [&'static str],
    kind: OperationKind<A>,
}

impl<A: Aggregate> Operation<A> {
    /// Registers a command with its ordered parameter names.
    #[must_use]
    pub const fn command(
        name: &'static str,
        params: &'static [&'static str],
        handler: CommandFn<A>,
    ) -> Self {
        Self {
            name,
            params,
            kind: OperationKind::Command(handler),
        }
    }

    /// Registers a query with its ordered parameter names.
    #[must_use]
    pub const fn query(
        name: &'static str,
        params: &'static [&'static str],
        handler: QueryFn<A>,
    ) -> Self {
        Self {
            name,
            params,
            kind: OperationKind::Query(handler),
        }
    }

    /// Operation name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Required positional parameter names, in order.
    #[must_use]
    pub const fn params(&self) -> &'static [&'static str] {
        self.params
    }

    /// Returns `true` for commands.
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(self.kind, OperationKind::Command(_))
    }

    /// The handler.
    #[must_use]
    pub const fn kind(&self) -> &OperationKind<A> {
        &self.kind
    }
}

impl<A: Aggregate> fmt::Debug for Operation<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("aggregate_type", &A::AGGREGATE_TYPE)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("is_command", &self.is_command())
            .finish()
    }
}

/// Input handed to an operation handler.
#[derive(Debug, Clone, Copy)]
pub struct OperationInput<'a> {
    details: &'a Details,
    at: DateTime<Utc>,
}

impl<'a> OperationInput<'a> {
    /// Creates handler input from recorded details and a logical timestamp.
    #[must_use]
    pub const fn new(details: &'a Details, at: DateTime<Utc>) -> Self {
        Self { details, at }
    }

    /// The logical time of the call. Handlers must use this instead of a
    /// wall clock so replay observes the same value.
    #[must_use]
    pub const fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// All recorded arguments.
    #[must_use]
    pub const fn details(&self) -> &'a Details {
        self.details
    }

    /// Decodes a required argument.
    ///
    /// # Errors
    ///
    /// Returns `DetailsError::Missing` if absent, `DetailsError::Invalid` if
    /// it does not decode as `T`.
    pub fn arg<T: DeserializeOwned>(&self, name: &str) -> Result<T, DetailsError> {
        let value = self
            .details
            .get(name)
            .ok_or_else(|| DetailsError::Missing(name.to_owned()))?;
        T::deserialize(value).map_err(|e| DetailsError::Invalid {
            name: name.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Decodes an optional argument; absent or `null` yields `None`.
    ///
    /// # Errors
    ///
    /// Returns `DetailsError::Invalid` if present but not a `T`.
    pub fn opt_arg<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, DetailsError> {
        match self.details.get(name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| DetailsError::Invalid {
                    name: name.to_owned(),
                    reason: e.to_string(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    enum TallyError {
        #[error(transparent)]
        Details(#[from] DetailsError),
    }

    #[derive(Debug, Default)]
    struct Tally {
        count: i64,
    }

    impl Tally {
        fn bump(&mut self, input: &OperationInput<'_>) -> Result<(), TallyError> {
            self.count += input.arg::<i64>("by")?;
            Ok(())
        }

        fn count(&self, _input: &OperationInput<'_>) -> Result<serde_json::Value, TallyError> {
            Ok(json!(self.count))
        }
    }

    static TALLY_OPERATIONS: [Operation<Tally>; 2] = [
        Operation::command("bump", &["by"], Tally::bump),
        Operation::query("count", &[], Tally::count),
    ];

    impl Aggregate for Tally {
        const AGGREGATE_TYPE: &'static str = "Tally";
        type Error = TallyError;

        fn operations() -> &'static [Operation<Self>] {
            &TALLY_OPERATIONS
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_registry_distinguishes_commands_from_queries() {
        assert!(Tally::is_command("bump"));
        assert!(!Tally::is_command("count"));
        assert!(!Tally::is_command("missing"));
        assert_eq!(Tally::operation("bump").unwrap().params(), &["by"]);
    }

    #[test]
    fn test_arg_reports_missing_and_invalid() {
        let mut details = Details::new();
        details.insert("by".to_owned(), json!("three"));
        let input = OperationInput::new(&details, at());

        assert_eq!(
            input.arg::<i64>("other").unwrap_err(),
            DetailsError::Missing("other".to_owned())
        );
        assert!(matches!(
            input.arg::<i64>("by").unwrap_err(),
            DetailsError::Invalid { name, .. } if name == "by"
        ));
    }

    #[test]
    fn test_opt_arg_treats_null_as_absent() {
        let mut details = Details::new();
        details.insert("memo".to_owned(), serde_json::Value::Null);
        let input = OperationInput::new(&details, at());

        assert_eq!(input.opt_arg::<String>("memo").unwrap(), None);
        assert_eq!(input.opt_arg::<String>("absent").unwrap(), None);
    }

    #[test]
    fn test_command_handler_reads_recorded_details() {
        let mut details = Details::new();
        details.insert("by".to_owned(), json!(4));
        let input = OperationInput::new(&details, at());
        let mut tally = Tally::default();

        let OperationKind::Command(handler) = Tally::operation("bump").unwrap().kind() else {
            panic!("bump must be a command");
        };
        handler(&mut tally, &input).unwrap();

        assert_eq!(tally.count, 4);
    }
}
