//! Identity generation for new aggregates.

use uuid::Uuid;

/// Produces fresh, globally unique aggregate identities.
pub trait IdGenerator: Send + Sync {
    /// Returns a new identity.
    fn generate(&self) -> String;
}

/// Random v4 UUID identities.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_ids_are_unique_and_parseable() {
        let ids = UuidIdGenerator;

        let first = ids.generate();
        let second = ids.generate();

        assert_ne!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }
}
