//! Replays historical events onto a live aggregate.

use chronicle_core::aggregate::{Aggregate, OperationInput, OperationKind};
use chronicle_core::error::ChronicleError;
use chronicle_core::event::Event;

/// Applies one historical event to `domain`.
///
/// The command handler named by the event runs with the recorded details
/// and with the event's `created_at` as its logical time, so the result is
/// the same however often the history is replayed.
///
/// # Errors
///
/// Returns `ChronicleError::UnknownEvent` if the name is not a registered
/// command, or `ChronicleError::Replay` if the handler rejects the event.
pub fn apply_event<A: Aggregate>(
    id: &str,
    domain: &mut A,
    event: &Event,
) -> Result<(), ChronicleError> {
    let unknown = || ChronicleError::UnknownEvent {
        aggregate_type: A::AGGREGATE_TYPE,
        name: event.name().to_owned(),
    };
    let operation = A::operation(event.name()).ok_or_else(unknown)?;
    let OperationKind::Command(handler) = operation.kind() else {
        return Err(unknown());
    };

    handler(
        domain,
        &OperationInput::new(event.details(), event.created_at()),
    )
    .map_err(|source| ChronicleError::Replay {
        aggregate_type: A::AGGREGATE_TYPE,
        id: id.to_owned(),
        event: event.name().to_owned(),
        source: Box::new(source),
    })
}

/// Applies `events` in order.
///
/// # Errors
///
/// Stops at and returns the first failure of [`apply_event`].
pub fn replay<A: Aggregate>(id: &str, domain: &mut A, events: &[Event]) -> Result<(), ChronicleError> {
    for event in events {
        apply_event(id, domain, event)?;
    }
    Ok(())
}
