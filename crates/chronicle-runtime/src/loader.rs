//! Builds aggregate handles, blank or replayed from storage.

use std::fmt;
use std::sync::Arc;

use chronicle_core::aggregate::Aggregate;
use chronicle_core::clock::Clock;
use chronicle_core::error::ChronicleError;
use chronicle_core::event::EventStream;
use chronicle_core::store::EventStore;

use crate::applicator::replay;
use crate::handle::AggregateHandle;
use crate::state::AggregateState;

/// Creates and loads aggregates against one event store.
#[derive(Clone)]
pub struct AggregateLoader {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for AggregateLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateLoader").finish_non_exhaustive()
    }
}

impl AggregateLoader {
    /// Creates a loader. `clock` stamps the commands later recorded on the
    /// handles it builds.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The event store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// A blank aggregate at version 0. Touches no storage.
    #[must_use]
    pub fn create<A: Aggregate>(&self, id: impl Into<String>) -> AggregateHandle<A> {
        AggregateHandle::new(
            AggregateState::new(id, 0, A::default()),
            Arc::clone(&self.clock),
        )
    }

    /// Rebuilds an aggregate from a stream already read.
    ///
    /// # Errors
    ///
    /// Returns `ChronicleError::AggregateNotFound` for an empty stream when
    /// `prohibit_new` is set, or any replay error.
    pub fn hydrate<A: Aggregate>(
        &self,
        stream: EventStream,
        prohibit_new: bool,
    ) -> Result<AggregateHandle<A>, ChronicleError> {
        if stream.is_new() && prohibit_new {
            return Err(ChronicleError::AggregateNotFound {
                aggregate_type: A::AGGREGATE_TYPE.to_owned(),
                id: stream.id,
            });
        }

        let mut state = AggregateState::new(stream.id, stream.current_version, A::default());
        replay(&state.id, &mut state.domain, &stream.events)?;
        tracing::debug!(
            aggregate_type = A::AGGREGATE_TYPE,
            id = %state.id,
            version = state.local_version,
            "hydrated aggregate"
        );
        Ok(AggregateHandle::new(state, Arc::clone(&self.clock)))
    }

    /// Loads one aggregate.
    ///
    /// # Errors
    ///
    /// See [`AggregateLoader::hydrate`]; storage errors pass through.
    pub async fn load<A: Aggregate>(
        &self,
        id: &str,
        prohibit_new: bool,
    ) -> Result<AggregateHandle<A>, ChronicleError> {
        let stream = self.store.read_stream(id, A::AGGREGATE_TYPE).await?;
        self.hydrate(stream, prohibit_new)
    }

    /// Loads several aggregates with one `read_many` call, in the order
    /// requested.
    ///
    /// # Errors
    ///
    /// Fails on the first identity that cannot be hydrated.
    pub async fn load_many<A: Aggregate>(
        &self,
        ids: &[String],
        prohibit_new: bool,
    ) -> Result<Vec<AggregateHandle<A>>, ChronicleError> {
        let streams = self.store.read_many(ids, A::AGGREGATE_TYPE).await?;
        streams
            .into_iter()
            .map(|stream| self.hydrate(stream, prohibit_new))
            .collect()
    }

    /// Loads every aggregate of type `A` with history.
    ///
    /// # Errors
    ///
    /// Storage and replay errors pass through.
    pub async fn load_all<A: Aggregate>(&self) -> Result<Vec<AggregateHandle<A>>, ChronicleError> {
        let streams = self.store.read_streams_for_type(A::AGGREGATE_TYPE).await?;
        streams
            .into_iter()
            .map(|stream| self.hydrate(stream, false))
            .collect()
    }
}
