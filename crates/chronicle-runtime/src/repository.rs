//! Aggregate finders on the unit of work.
//!
//! Every finder consults the identity map first and registers what it
//! loads, so repeated lookups within one scope share an instance.

use chronicle_core::aggregate::Aggregate;
use chronicle_core::error::ChronicleError;

use crate::handle::AggregateHandle;
use crate::unit_of_work::UnitOfWork;

impl UnitOfWork {
    async fn find_registered<A: Aggregate>(
        &self,
        id: &str,
        prohibit_new: bool,
    ) -> Result<AggregateHandle<A>, ChronicleError> {
        if let Some(cached) = self.fetch_aggregate::<A>(id) {
            return Ok(cached);
        }
        let loaded = self.loader().load::<A>(id, prohibit_new).await?;
        Ok(self.store_aggregate(loaded))
    }

    /// Finds an aggregate with history.
    ///
    /// # Errors
    ///
    /// Returns `ChronicleError::AggregateNotFound` if nothing was ever
    /// committed for `id` and it is not cached in this scope.
    pub async fn find<A: Aggregate>(&self, id: &str) -> Result<AggregateHandle<A>, ChronicleError> {
        self.find_registered(id, true).await
    }

    /// Finds an aggregate, or starts a blank one at version 0.
    ///
    /// # Errors
    ///
    /// Storage and replay errors pass through.
    pub async fn find_or_new<A: Aggregate>(
        &self,
        id: &str,
    ) -> Result<AggregateHandle<A>, ChronicleError> {
        self.find_registered(id, false).await
    }

    /// Creates a blank aggregate under a freshly generated identity.
    #[must_use]
    pub fn create<A: Aggregate>(&self) -> AggregateHandle<A> {
        let id = self.id_generator().generate();
        self.create_with_id(id)
    }

    /// Creates a blank aggregate under `id`. An instance already cached for
    /// `id` in this scope is returned instead.
    #[must_use]
    pub fn create_with_id<A: Aggregate>(&self, id: impl Into<String>) -> AggregateHandle<A> {
        self.store_aggregate(self.loader().create::<A>(id))
    }

    /// Finds several aggregates, in the order requested. Identities not
    /// cached are read with a single batch call.
    ///
    /// # Errors
    ///
    /// Returns `ChronicleError::AggregateNotFound` for the first identity
    /// with no history.
    pub async fn find_many<A: Aggregate>(
        &self,
        ids: &[String],
    ) -> Result<Vec<AggregateHandle<A>>, ChronicleError> {
        let missing: Vec<String> = ids
            .iter()
            .filter(|id| self.fetch_aggregate::<A>(id).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            for loaded in self.loader().load_many::<A>(&missing, true).await? {
                self.store_aggregate(loaded);
            }
        }

        ids.iter()
            .map(|id| {
                self.fetch_aggregate::<A>(id)
                    .ok_or_else(|| ChronicleError::AggregateNotFound {
                        aggregate_type: A::AGGREGATE_TYPE.to_owned(),
                        id: id.clone(),
                    })
            })
            .collect()
    }

    /// Loads every aggregate of type `A` with history. Instances already
    /// cached in this scope take the place of their freshly loaded copies.
    ///
    /// # Errors
    ///
    /// Storage and replay errors pass through.
    pub async fn all<A: Aggregate>(&self) -> Result<Vec<AggregateHandle<A>>, ChronicleError> {
        let loaded = self.loader().load_all::<A>().await?;
        Ok(loaded
            .into_iter()
            .map(|handle| self.store_aggregate(handle))
            .collect())
    }
}
