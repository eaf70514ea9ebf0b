//! Runtime bookkeeping carried alongside an aggregate's domain state.

/// Domain state plus identity and version counters.
///
/// `local_version` counts every event applied in memory, committed or not;
/// `persisted_version` counts those durably stored. The handle keeps
/// `local_version - persisted_version` equal to its number of dirty events.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateState<A> {
    /// Aggregate identity.
    pub id: String,
    /// Version including uncommitted events.
    pub local_version: i64,
    /// Version durably committed.
    pub persisted_version: i64,
    /// The domain instance.
    pub domain: A,
}

impl<A> AggregateState<A> {
    /// Builds state at `version`, with both counters equal.
    #[must_use]
    pub fn new(id: impl Into<String>, version: i64, domain: A) -> Self {
        Self {
            id: id.into(),
            local_version: version,
            persisted_version: version,
            domain,
        }
    }

    /// Number of events applied but not yet committed.
    #[must_use]
    pub fn uncommitted(&self) -> i64 {
        self.local_version - self.persisted_version
    }
}
