//! Predictable identity generation for tests.

use std::sync::atomic::{AtomicU64, Ordering};

use chronicle_core::id::IdGenerator;

/// Generates `"{prefix}-1"`, `"{prefix}-2"`, and so on.
#[derive(Debug)]
pub struct SequenceIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequenceIdGenerator {
    /// Create a generator with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn generate(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{n}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_ids_count_up_from_one() {
        let ids = SequenceIdGenerator::new("acct");

        assert_eq!(ids.generate(), "acct-1");
        assert_eq!(ids.generate(), "acct-2");
    }
}
