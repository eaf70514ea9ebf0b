//! Unit of work: identity map plus transactional batching of saves.
//!
//! An immediate unit of work commits and publishes each save as it
//! arrives. A scoped one queues saves until [`UnitOfWork::execute_work`],
//! which commits the whole queue in one storage transaction and publishes
//! only after that transaction succeeds.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chronicle_core::aggregate::Aggregate;
use chronicle_core::bus::MessageBus;
use chronicle_core::error::ChronicleError;
use chronicle_core::event::Metadata;
use chronicle_core::id::IdGenerator;

use crate::handle::AggregateHandle;
use crate::loader::AggregateLoader;
use crate::save::{PendingSave, SaveReceipt};

type IdentityKey = (&'static str, String);
type IdentityMap = HashMap<IdentityKey, Box<dyn Any + Send + Sync>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Immediate,
    Scoped,
}

struct Inner {
    mode: Mode,
    loader: AggregateLoader,
    bus: Arc<dyn MessageBus>,
    ids: Arc<dyn IdGenerator>,
    metadata: Metadata,
    identity_map: Mutex<IdentityMap>,
    pending: Mutex<Vec<PendingSave>>,
}

/// One logical operation context.
///
/// Cheap to clone; clones share the identity map and the queue. A unit of
/// work belongs to one task and is passed explicitly to whatever needs it.
#[derive(Clone)]
pub struct UnitOfWork {
    inner: Arc<Inner>,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("mode", &self.inner.mode)
            .field("metadata", &self.inner.metadata)
            .field("cached", &lock(&self.inner.identity_map).len())
            .field("pending", &self.pending_saves())
            .finish()
    }
}

impl UnitOfWork {
    fn new(
        mode: Mode,
        loader: AggregateLoader,
        bus: Arc<dyn MessageBus>,
        ids: Arc<dyn IdGenerator>,
        metadata: Metadata,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                mode,
                loader,
                bus,
                ids,
                metadata,
                identity_map: Mutex::new(HashMap::new()),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A unit of work with no active scope: every save commits at once.
    #[must_use]
    pub fn immediate(
        loader: AggregateLoader,
        bus: Arc<dyn MessageBus>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self::new(Mode::Immediate, loader, bus, ids, Metadata::new())
    }

    /// A scope that batches saves until executed. `metadata` is merged into
    /// every receipt it publishes.
    #[must_use]
    pub fn scoped(
        loader: AggregateLoader,
        bus: Arc<dyn MessageBus>,
        ids: Arc<dyn IdGenerator>,
        metadata: Metadata,
    ) -> Self {
        Self::new(Mode::Scoped, loader, bus, ids, metadata)
    }

    /// Returns `true` for a scope that defers its saves.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.inner.mode == Mode::Scoped
    }

    /// Scope-level metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.inner.metadata
    }

    /// Number of saves queued and not yet executed.
    #[must_use]
    pub fn pending_saves(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    pub(crate) fn loader(&self) -> &AggregateLoader {
        &self.inner.loader
    }

    pub(crate) fn id_generator(&self) -> &dyn IdGenerator {
        self.inner.ids.as_ref()
    }

    /// Looks up a cached handle.
    #[must_use]
    pub fn fetch_aggregate<A: Aggregate>(&self, id: &str) -> Option<AggregateHandle<A>> {
        lock(&self.inner.identity_map)
            .get(&(A::AGGREGATE_TYPE, id.to_owned()))
            .and_then(|entry| entry.downcast_ref::<AggregateHandle<A>>())
            .cloned()
    }

    /// Caches `handle` unless its identity is already cached, and returns
    /// whichever handle is cached afterwards. The first handle stored for an
    /// identity wins for the rest of the scope.
    pub fn store_aggregate<A: Aggregate>(&self, handle: AggregateHandle<A>) -> AggregateHandle<A> {
        let mut map = lock(&self.inner.identity_map);
        match map.entry((A::AGGREGATE_TYPE, handle.id())) {
            Entry::Occupied(entry) => entry
                .get()
                .downcast_ref::<AggregateHandle<A>>()
                .cloned()
                .unwrap_or(handle),
            Entry::Vacant(entry) => {
                entry.insert(Box::new(handle.clone()));
                handle
            }
        }
    }

    /// Accepts one save from a handle.
    ///
    /// Immediate: appends to storage and publishes, returning the receipt.
    /// Scoped: queues the save and returns `None`.
    ///
    /// # Errors
    ///
    /// Storage and message-bus errors of an immediate save pass through.
    pub async fn handle_save(
        &self,
        pending: PendingSave,
    ) -> Result<Option<SaveReceipt>, ChronicleError> {
        match self.inner.mode {
            Mode::Scoped => {
                tracing::debug!(
                    aggregate_type = pending.aggregate_type(),
                    id = pending.id(),
                    events = pending.events().len(),
                    expected_version = pending.expected_version(),
                    "queued save"
                );
                lock(&self.inner.pending).push(pending);
                Ok(None)
            }
            Mode::Immediate => {
                self.inner
                    .loader
                    .store()
                    .append(
                        pending.id(),
                        pending.aggregate_type(),
                        pending.events(),
                        pending.expected_version(),
                    )
                    .await?;
                let receipt = pending.into_receipt(&self.inner.metadata);
                self.publish(&receipt).await?;
                tracing::info!(
                    aggregate_type = receipt.aggregate_type,
                    id = %receipt.id,
                    events = receipt.events.len(),
                    "saved aggregate"
                );
                Ok(Some(receipt))
            }
        }
    }

    /// Commits every queued save in one storage transaction, then publishes
    /// one receipt per save. The queue is emptied whether or not the commit
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Any storage error aborts the whole batch: nothing is persisted and
    /// nothing is published. A message-bus error is returned after the
    /// commit has already succeeded.
    pub async fn execute_work(&self) -> Result<Vec<SaveReceipt>, ChronicleError> {
        let saves = std::mem::take(&mut *lock(&self.inner.pending));
        if saves.is_empty() {
            return Ok(Vec::new());
        }
        let count = saves.len();

        match self.commit_and_publish(saves).await {
            Ok(receipts) => {
                tracing::info!(saves = count, "committed unit of work");
                Ok(receipts)
            }
            Err(err) => {
                tracing::warn!(saves = count, error = %err, "unit of work failed");
                Err(err)
            }
        }
    }

    async fn commit_and_publish(
        &self,
        saves: Vec<PendingSave>,
    ) -> Result<Vec<SaveReceipt>, ChronicleError> {
        let mut tx = self.inner.loader.store().begin_transaction().await?;
        for save in &saves {
            tx.append(
                save.id(),
                save.aggregate_type(),
                save.events(),
                save.expected_version(),
            )
            .await?;
        }
        tx.commit().await?;

        let receipts: Vec<SaveReceipt> = saves
            .into_iter()
            .map(|save| save.into_receipt(&self.inner.metadata))
            .collect();
        for receipt in &receipts {
            self.publish(receipt).await?;
        }
        Ok(receipts)
    }

    async fn publish(&self, receipt: &SaveReceipt) -> Result<(), ChronicleError> {
        self.inner
            .bus
            .publish(
                &receipt.id,
                receipt.aggregate_type,
                &receipt.events,
                &receipt.metadata,
            )
            .await
    }
}
