//! Deferred saves and the receipts of committed ones.

use chronicle_core::event::{Event, Metadata};

/// A save captured at enqueue time and not yet executed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    id: String,
    aggregate_type: &'static str,
    events: Vec<Event>,
    expected_version: i64,
    metadata: Metadata,
}

impl PendingSave {
    /// Captures a save of `events`, to be checked against
    /// `expected_version` at commit.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        aggregate_type: &'static str,
        events: Vec<Event>,
        expected_version: i64,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: id.into(),
            aggregate_type,
            events,
            expected_version,
            metadata,
        }
    }

    /// Aggregate identity.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Aggregate type name.
    #[must_use]
    pub fn aggregate_type(&self) -> &'static str {
        self.aggregate_type
    }

    /// The dirty events captured.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// The persisted version seen when the save was captured.
    #[must_use]
    pub fn expected_version(&self) -> i64 {
        self.expected_version
    }

    /// Metadata supplied with the save.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Turns a committed save into its receipt. `scope_metadata` is laid
    /// down first and the save's own metadata overrides matching keys.
    #[must_use]
    pub fn into_receipt(self, scope_metadata: &Metadata) -> SaveReceipt {
        let mut metadata = scope_metadata.clone();
        metadata.extend(self.metadata);
        SaveReceipt {
            id: self.id,
            aggregate_type: self.aggregate_type,
            events: self.events,
            metadata,
        }
    }
}

/// Result of a committed save, as published to the message bus.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReceipt {
    /// Aggregate identity.
    pub id: String,
    /// Aggregate type name.
    pub aggregate_type: &'static str,
    /// Committed events, oldest first.
    pub events: Vec<Event>,
    /// Merged metadata.
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_metadata_overrides_scope_metadata() {
        let mut scope = Metadata::new();
        scope.insert("request_id".to_owned(), json!("req-1"));
        scope.insert("actor".to_owned(), json!("system"));
        let mut own = Metadata::new();
        own.insert("actor".to_owned(), json!("ada"));
        let pending = PendingSave::new("acct-1", "Account", Vec::new(), 2, own);

        let receipt = pending.into_receipt(&scope);

        assert_eq!(receipt.metadata["request_id"], "req-1");
        assert_eq!(receipt.metadata["actor"], "ada");
        assert_eq!(receipt.id, "acct-1");
    }
}
