//! Event records and event streams.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChronicleError;

/// Fractional-second digits an event timestamp keeps.
///
/// Matches PostgreSQL `TIMESTAMPTZ`, so a timestamp reads back from storage
/// exactly as it was recorded.
pub const TIMESTAMP_DIGITS: u16 = 6;

/// Truncates `at` to the precision events are stored with.
#[must_use]
pub fn event_timestamp(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(TIMESTAMP_DIGITS)
}

/// Converts an event count into a stream version.
///
/// # Errors
///
/// Returns `ChronicleError::Infrastructure` if the count does not fit in a
/// version.
pub fn version_for(count: usize) -> Result<i64, ChronicleError> {
    i64::try_from(count)
        .map_err(|e| ChronicleError::Infrastructure(format!("stream too long: {e}")))
}

/// Ordered mapping of parameter name to argument value.
///
/// Insertion order is preserved, so the mapping reads back in the order the
/// command declared its parameters.
pub type Details = serde_json::Map<String, serde_json::Value>;

/// Extra data published alongside committed events.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Immutable record of one historical command invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    name: String,
    created_at: DateTime<Utc>,
    details: Details,
}

impl Event {
    /// Creates a new event record.
    #[must_use]
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>, details: Details) -> Self {
        Self {
            name: name.into(),
            created_at,
            details,
        }
    }

    /// Name of the command this event records.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical timestamp the command ran at.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Arguments of the call, keyed by parameter name.
    #[must_use]
    pub fn details(&self) -> &Details {
        &self.details
    }
}

/// Ordered history of one aggregate plus its persisted version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStream {
    /// Aggregate identity.
    pub id: String,
    /// Events, oldest first.
    pub events: Vec<Event>,
    /// Number of events durably committed.
    pub current_version: i64,
}

impl EventStream {
    /// Creates a stream from its parts.
    #[must_use]
    pub fn new(id: impl Into<String>, events: Vec<Event>, current_version: i64) -> Self {
        Self {
            id: id.into(),
            events,
            current_version,
        }
    }

    /// A stream with no history.
    #[must_use]
    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, Vec::new(), 0)
    }

    /// Returns `true` when nothing has been committed for this identity.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.current_version == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use serde_json::json;

    #[test]
    fn test_event_timestamp_drops_sub_microsecond_digits() {
        let at = Utc
            .with_ymd_and_hms(2026, 1, 15, 10, 0, 0)
            .unwrap()
            .with_nanosecond(721_407_821)
            .unwrap();

        let truncated = event_timestamp(at);

        assert_eq!(truncated.nanosecond(), 721_407_000);
        assert_eq!(event_timestamp(truncated), truncated);
    }

    #[test]
    fn test_version_for_counts_events() {
        assert_eq!(version_for(0).unwrap(), 0);
        assert_eq!(version_for(3).unwrap(), 3);
    }

    #[test]
    fn test_details_keep_insertion_order() {
        let mut details = Details::new();
        details.insert("zeta".to_owned(), json!(1));
        details.insert("alpha".to_owned(), json!(2));
        details.insert("mid".to_owned(), json!(3));

        let event = Event::new(
            "reorder",
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            details,
        );

        let keys: Vec<&str> = event.details().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_serialized_event_preserves_detail_order() {
        let mut details = Details::new();
        details.insert("second".to_owned(), json!("b"));
        details.insert("first".to_owned(), json!("a"));
        let event = Event::new(
            "rename",
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            details,
        );

        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&encoded).unwrap();

        let keys: Vec<&str> = decoded.details().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["second", "first"]);
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_empty_stream_is_new() {
        let stream = EventStream::empty("acct-1");

        assert!(stream.is_new());
        assert!(stream.events.is_empty());
        assert_eq!(stream.id, "acct-1");
    }
}
