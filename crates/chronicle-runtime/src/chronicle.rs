//! The runtime context and its builder.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chronicle_core::bus::MessageBus;
use chronicle_core::clock::{Clock, SystemClock};
use chronicle_core::error::ChronicleError;
use chronicle_core::event::Metadata;
use chronicle_core::id::{IdGenerator, UuidIdGenerator};
use chronicle_core::store::EventStore;

use crate::config::ChronicleConfig;
use crate::loader::AggregateLoader;
use crate::unit_of_work::UnitOfWork;

/// Collaborators and settings shared by every unit of work.
#[derive(Clone)]
pub struct Chronicle {
    loader: AggregateLoader,
    bus: Arc<dyn MessageBus>,
    ids: Arc<dyn IdGenerator>,
    config: ChronicleConfig,
}

impl fmt::Debug for Chronicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chronicle")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Chronicle {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> ChronicleBuilder {
        ChronicleBuilder::default()
    }

    /// A unit of work outside any scope; each save commits on its own.
    #[must_use]
    pub fn immediate(&self) -> UnitOfWork {
        UnitOfWork::immediate(
            self.loader.clone(),
            Arc::clone(&self.bus),
            Arc::clone(&self.ids),
        )
    }

    /// A fresh scope with no shared metadata.
    #[must_use]
    pub fn unit_of_work(&self) -> UnitOfWork {
        self.unit_of_work_with_metadata(Metadata::new())
    }

    /// A fresh scope whose receipts all carry `metadata`.
    #[must_use]
    pub fn unit_of_work_with_metadata(&self, metadata: Metadata) -> UnitOfWork {
        UnitOfWork::scoped(
            self.loader.clone(),
            Arc::clone(&self.bus),
            Arc::clone(&self.ids),
            metadata,
        )
    }

    /// Runs `work` in a fresh scope, executing the scope afterwards when
    /// autosave is configured.
    ///
    /// # Errors
    ///
    /// Returns the error of `work`, in which case the scope is discarded
    /// unexecuted, or the error of executing the scope.
    pub async fn with_unit_of_work<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(UnitOfWork) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ChronicleError>,
    {
        Self::within(self.unit_of_work(), self.config.autosave, work).await
    }

    /// Runs `work` in the scope `uow`, executing it afterwards if
    /// `autosave` is set and `work` succeeded. With autosave off the queued
    /// saves stay in `uow` for the caller to execute.
    ///
    /// # Errors
    ///
    /// Returns the error of `work` or of executing the scope.
    pub async fn within<F, Fut, T, E>(uow: UnitOfWork, autosave: bool, work: F) -> Result<T, E>
    where
        F: FnOnce(UnitOfWork) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ChronicleError>,
    {
        let value = work(uow.clone()).await?;
        if autosave {
            uow.execute_work().await?;
        } else if uow.pending_saves() > 0 {
            tracing::debug!(
                pending = uow.pending_saves(),
                "autosave off, leaving saves queued"
            );
        }
        Ok(value)
    }

    /// A fresh identity from the configured generator.
    #[must_use]
    pub fn generate_id(&self) -> String {
        self.ids.generate()
    }

    /// The loader bound to this context's store and clock.
    #[must_use]
    pub fn loader(&self) -> &AggregateLoader {
        &self.loader
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ChronicleConfig {
        &self.config
    }
}

/// Builder for [`Chronicle`].
#[derive(Default)]
pub struct ChronicleBuilder {
    store: Option<Arc<dyn EventStore>>,
    bus: Option<Arc<dyn MessageBus>>,
    ids: Option<Arc<dyn IdGenerator>>,
    clock: Option<Arc<dyn Clock>>,
    config: ChronicleConfig,
}

impl fmt::Debug for ChronicleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChronicleBuilder")
            .field("has_event_store", &self.store.is_some())
            .field("has_message_bus", &self.bus.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ChronicleBuilder {
    /// Storage collaborator. Required.
    #[must_use]
    pub fn event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Message-bus collaborator. Required.
    #[must_use]
    pub fn message_bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Identity generator. Defaults to random UUIDs.
    #[must_use]
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Clock stamping recorded commands. Defaults to the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Runtime settings. Defaults to [`ChronicleConfig::default`].
    #[must_use]
    pub fn config(mut self, config: ChronicleConfig) -> Self {
        self.config = config;
        self
    }

    /// Assembles the context.
    ///
    /// # Errors
    ///
    /// Returns `ChronicleError::UnsetEventStore` or
    /// `ChronicleError::UnsetMessageBus` if a required collaborator is
    /// missing.
    pub fn build(self) -> Result<Chronicle, ChronicleError> {
        let store = self.store.ok_or(ChronicleError::UnsetEventStore)?;
        let bus = self.bus.ok_or(ChronicleError::UnsetMessageBus)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self.ids.unwrap_or_else(|| Arc::new(UuidIdGenerator));
        Ok(Chronicle {
            loader: AggregateLoader::new(store, clock),
            bus,
            ids,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_test_support::{RecordingEventStore, RecordingMessageBus, SequenceIdGenerator};

    #[test]
    fn test_build_requires_an_event_store() {
        let result = Chronicle::builder()
            .message_bus(Arc::new(RecordingMessageBus::new()))
            .build();

        assert!(matches!(result, Err(ChronicleError::UnsetEventStore)));
    }

    #[test]
    fn test_build_requires_a_message_bus() {
        let result = Chronicle::builder()
            .event_store(Arc::new(RecordingEventStore::new()))
            .build();

        assert!(matches!(result, Err(ChronicleError::UnsetMessageBus)));
    }

    #[test]
    fn test_defaults_fill_optional_collaborators() {
        let chronicle = Chronicle::builder()
            .event_store(Arc::new(RecordingEventStore::new()))
            .message_bus(Arc::new(RecordingMessageBus::new()))
            .build()
            .unwrap();

        assert!(chronicle.config().autosave);
        assert_ne!(chronicle.generate_id(), chronicle.generate_id());
    }

    #[test]
    fn test_scopes_are_independent() {
        let chronicle = Chronicle::builder()
            .event_store(Arc::new(RecordingEventStore::new()))
            .message_bus(Arc::new(RecordingMessageBus::new()))
            .id_generator(Arc::new(SequenceIdGenerator::new("acct")))
            .build()
            .unwrap();

        let immediate = chronicle.immediate();
        let scoped = chronicle.unit_of_work();

        assert!(!immediate.is_scoped());
        assert!(scoped.is_scoped());
        assert_eq!(chronicle.generate_id(), "acct-1");
    }
}
