//! The aggregate handle: records commands as events and saves them.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chronicle_core::aggregate::{Aggregate, OperationInput, OperationKind};
use chronicle_core::clock::Clock;
use chronicle_core::error::{ChronicleError, EventArgumentError, InvokeError};
use chronicle_core::event::{Event, Metadata, event_timestamp, version_for};
use serde_json::Value;

use crate::args::{CallArgs, build_details};
use crate::save::{PendingSave, SaveReceipt};
use crate::state::AggregateState;
use crate::unit_of_work::UnitOfWork;

struct Tracked<A> {
    state: AggregateState<A>,
    dirty: Vec<Event>,
}

/// Shared handle to one live aggregate instance.
///
/// Clones refer to the same instance; the unit of work's identity map hands
/// out clones so that every lookup of an identity sees the same state.
pub struct AggregateHandle<A: Aggregate> {
    inner: Arc<Mutex<Tracked<A>>>,
    clock: Arc<dyn Clock>,
}

impl<A: Aggregate> Clone for AggregateHandle<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<A: Aggregate + fmt::Debug> fmt::Debug for AggregateHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tracked = self.lock();
        f.debug_struct("AggregateHandle")
            .field("aggregate_type", &A::AGGREGATE_TYPE)
            .field("state", &tracked.state)
            .field("dirty", &tracked.dirty.len())
            .finish()
    }
}

impl<A: Aggregate> AggregateHandle<A> {
    pub(crate) fn new(state: AggregateState<A>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Tracked {
                state,
                dirty: Vec::new(),
            })),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tracked<A>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Aggregate identity.
    #[must_use]
    pub fn id(&self) -> String {
        self.lock().state.id.clone()
    }

    /// Version including uncommitted events.
    #[must_use]
    pub fn local_version(&self) -> i64 {
        self.lock().state.local_version
    }

    /// Version durably committed.
    #[must_use]
    pub fn persisted_version(&self) -> i64 {
        self.lock().state.persisted_version
    }

    /// Events recorded since the last save, oldest first.
    #[must_use]
    pub fn dirty_events(&self) -> Vec<Event> {
        self.lock().dirty.clone()
    }

    /// Runs `f` against the domain state.
    ///
    /// The handle stays locked while `f` runs, so `f` must not call back
    /// into this handle or any clone of it; doing so deadlocks. Copy out
    /// what you need and act on it after `read` returns.
    pub fn read<R>(&self, f: impl FnOnce(&A) -> R) -> R {
        f(&self.lock().state.domain)
    }

    /// Returns `true` if both handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Invokes the operation `name`.
    ///
    /// A command is recorded as a dirty event stamped with the clock's
    /// current time, then applied; it returns `Value::Null`. If the domain
    /// handler fails, the event is dropped and `local_version` restored,
    /// but any fields the handler changed before failing stay changed.
    ///
    /// A query is evaluated directly and its result returned, after being
    /// passed to the continuation if one was given.
    ///
    /// # Errors
    ///
    /// Returns `InvokeError::UnknownOperation` for an unregistered name,
    /// `InvokeError::Argument` if the call cannot be recorded, or
    /// `InvokeError::Domain` with the handler's error unchanged.
    pub fn invoke(&self, name: &str, args: CallArgs) -> Result<Value, InvokeError<A::Error>> {
        let operation = A::operation(name).ok_or_else(|| InvokeError::UnknownOperation {
            aggregate_type: A::AGGREGATE_TYPE,
            operation: name.to_owned(),
        })?;
        let (positional, options, continuation) = args.into_parts();

        match operation.kind() {
            OperationKind::Command(handler) => {
                if continuation.is_some() {
                    return Err(EventArgumentError::ContinuationNotAllowed {
                        operation: name.to_owned(),
                    }
                    .into());
                }
                let at = event_timestamp(self.clock.now());
                let details = build_details(name, operation.params(), positional, options)?;

                let mut tracked = self.lock();
                let Tracked { state, dirty } = &mut *tracked;
                dirty.push(Event::new(name, at, details));
                state.local_version += 1;
                let recorded = &dirty[dirty.len() - 1];

                if let Err(err) = handler(
                    &mut state.domain,
                    &OperationInput::new(recorded.details(), at),
                ) {
                    dirty.pop();
                    state.local_version -= 1;
                    tracing::debug!(
                        aggregate_type = A::AGGREGATE_TYPE,
                        id = %state.id,
                        operation = name,
                        error = %err,
                        "command rejected, event discarded"
                    );
                    return Err(InvokeError::Domain(err));
                }
                tracing::debug!(
                    aggregate_type = A::AGGREGATE_TYPE,
                    id = %state.id,
                    operation = name,
                    version = state.local_version,
                    "recorded command"
                );
                Ok(Value::Null)
            }
            OperationKind::Query(handler) => {
                let details = build_details(name, operation.params(), positional, options)?;
                let at = event_timestamp(self.clock.now());
                let value = {
                    let tracked = self.lock();
                    handler(&tracked.state.domain, &OperationInput::new(&details, at))
                        .map_err(InvokeError::Domain)?
                };
                if let Some(continuation) = continuation {
                    continuation(&value);
                }
                Ok(value)
            }
        }
    }

    /// Saves the dirty events through `uow` with no extra metadata.
    ///
    /// # Errors
    ///
    /// See [`AggregateHandle::save_with`].
    pub async fn save(&self, uow: &UnitOfWork) -> Result<Option<SaveReceipt>, ChronicleError> {
        self.save_with(uow, Metadata::new()).await
    }

    /// Hands the dirty events to `uow` as one pending save, then marks them
    /// persisted.
    ///
    /// An immediate unit of work commits and publishes before returning the
    /// receipt. A scoped one only queues the save and returns `None`; the
    /// handle is marked persisted all the same, and must be discarded if the
    /// scope later fails to commit.
    ///
    /// # Errors
    ///
    /// Returns the storage or message-bus error of an immediate commit. The
    /// dirty events are kept in that case.
    pub async fn save_with(
        &self,
        uow: &UnitOfWork,
        metadata: Metadata,
    ) -> Result<Option<SaveReceipt>, ChronicleError> {
        let pending = {
            let tracked = self.lock();
            PendingSave::new(
                tracked.state.id.clone(),
                A::AGGREGATE_TYPE,
                tracked.dirty.clone(),
                tracked.state.persisted_version,
                metadata,
            )
        };
        let captured = pending.events().len();
        version_for(captured)?;

        let receipt = uow.handle_save(pending).await?;

        let mut tracked = self.lock();
        let drained = captured.min(tracked.dirty.len());
        tracked.dirty.drain(..drained);
        tracked.state.persisted_version += version_for(drained)?;
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    use chrono::{TimeZone, Timelike, Utc};
    use chronicle_test_support::{Account, AccountError, FixedClock};
    use serde_json::json;

    fn handle() -> AggregateHandle<Account> {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        AggregateHandle::new(AggregateState::new("acct-1", 0, Account::default()), Arc::new(clock))
    }

    fn assert_version_invariant(handle: &AggregateHandle<Account>) {
        assert_eq!(
            handle.local_version() - handle.persisted_version(),
            version_for(handle.dirty_events().len()).unwrap()
        );
    }

    #[test]
    fn test_command_is_recorded_and_applied() {
        // Arrange
        let handle = handle();

        // Act
        let result = handle.invoke("rename", CallArgs::new().arg("new-name"));

        // Assert
        assert_eq!(result.unwrap(), Value::Null);
        let dirty = handle.dirty_events();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].name(), "rename");
        assert_eq!(dirty[0].details()["name"], "new-name");
        assert_eq!(handle.local_version(), 1);
        assert_eq!(handle.read(|a| a.name.clone()).as_deref(), Some("new-name"));
        assert_eq!(handle.read(|a| a.renamed_at), Some(dirty[0].created_at()));
        assert_version_invariant(&handle);
    }

    #[test]
    fn test_recorded_timestamp_is_truncated_to_microseconds() {
        // Arrange
        let at = Utc
            .with_ymd_and_hms(2026, 1, 15, 10, 0, 0)
            .unwrap()
            .with_nanosecond(721_407_821)
            .unwrap();
        let handle = AggregateHandle::new(
            AggregateState::new("acct-1", 0, Account::default()),
            Arc::new(FixedClock(at)),
        );

        // Act
        handle
            .invoke("rename", CallArgs::new().arg("new-name"))
            .unwrap();

        // Assert
        let recorded = handle.dirty_events()[0].created_at();
        assert_eq!(recorded.nanosecond(), 721_407_000);
        assert_eq!(handle.read(|a| a.renamed_at), Some(recorded));
    }

    #[test]
    fn test_failing_command_rolls_back_bookkeeping_only() {
        // Arrange
        let handle = handle();
        handle
            .invoke("deposit", CallArgs::new().arg(5))
            .unwrap();

        // Act
        let result = handle.invoke("withdraw", CallArgs::new().arg(50));

        // Assert
        assert!(matches!(
            result,
            Err(InvokeError::Domain(AccountError::InsufficientFunds { requested: 50, .. }))
        ));
        assert_eq!(handle.local_version(), 1);
        assert_eq!(handle.dirty_events().len(), 1);
        assert_eq!(handle.read(|a| a.withdrawal_attempts), 1);
        assert_version_invariant(&handle);
    }

    #[test]
    fn test_command_with_continuation_is_rejected_before_recording() {
        let handle = handle();

        let result = handle.invoke(
            "rename",
            CallArgs::new().arg("x").with_continuation(|_| {}),
        );

        assert!(matches!(
            result,
            Err(InvokeError::Argument(
                EventArgumentError::ContinuationNotAllowed { .. }
            ))
        ));
        assert!(handle.dirty_events().is_empty());
        assert_eq!(handle.local_version(), 0);
    }

    #[test]
    fn test_wrong_arity_is_rejected_before_recording() {
        let handle = handle();

        let result = handle.invoke("deposit", CallArgs::new());

        assert!(matches!(
            result,
            Err(InvokeError::Argument(EventArgumentError::Arity { .. }))
        ));
        assert_eq!(handle.local_version(), 0);
    }

    #[test]
    fn test_options_are_recorded_after_positional_arguments() {
        let handle = handle();

        handle
            .invoke("deposit", CallArgs::new().arg(10).option("memo", "rent"))
            .unwrap();

        let details = handle.dirty_events()[0].details().clone();
        let keys: Vec<&str> = details.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["amount", "memo"]);
        assert_eq!(handle.read(|a| a.memos.clone()), vec!["rent".to_owned()]);
    }

    #[test]
    fn test_query_bypasses_bookkeeping_and_feeds_continuation() {
        // Arrange
        let handle = handle();
        handle.invoke("deposit", CallArgs::new().arg(7)).unwrap();
        let seen = Arc::new(AtomicI64::new(0));
        let sink = Arc::clone(&seen);

        // Act
        let balance = handle
            .invoke(
                "balance",
                CallArgs::new().with_continuation(move |value| {
                    sink.store(value.as_i64().unwrap_or_default(), Ordering::SeqCst);
                }),
            )
            .unwrap();

        // Assert
        assert_eq!(balance, json!(7));
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(handle.local_version(), 1);
        assert_eq!(handle.dirty_events().len(), 1);
    }

    #[test]
    fn test_query_arguments_are_mapped_like_commands() {
        let handle = handle();

        let allowed = handle
            .invoke("can_withdraw", CallArgs::new().arg(1))
            .unwrap();

        assert_eq!(allowed, json!(false));
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let handle = handle();

        let result = handle.invoke("close", CallArgs::new());

        assert!(matches!(
            result,
            Err(InvokeError::UnknownOperation { ref operation, .. }) if operation == "close"
        ));
    }

    #[test]
    fn test_clones_share_one_instance() {
        let handle = handle();
        let clone = handle.clone();

        clone.invoke("deposit", CallArgs::new().arg(3)).unwrap();

        assert!(handle.ptr_eq(&clone));
        assert_eq!(handle.read(|a| a.balance), 3);
    }

    #[test]
    fn test_value_read_out_can_drive_a_command_on_a_clone() {
        // Arrange
        let handle = handle();
        handle.invoke("deposit", CallArgs::new().arg(7)).unwrap();
        let clone = handle.clone();

        // Act
        let balance = handle.read(|a| a.balance);
        clone
            .invoke("withdraw", CallArgs::new().arg(balance))
            .unwrap();

        // Assert
        assert_eq!(handle.read(|a| a.balance), 0);
        assert_eq!(handle.local_version(), 2);
    }
}
