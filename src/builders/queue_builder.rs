//! Builder assembling a [`CentralWorkQueue`] from its collaborators.

use std::sync::Arc;

use crate::config::WorkerCountPolicy;
use crate::core::identity::{IdentityBinder, NoopIdentityBinder};
use crate::core::queue::CentralWorkQueue;
use crate::core::registry::{FactoryRegistry, TaskRegistry};
use crate::core::StoreError;
use crate::infra::persistence::DurableStore;
use crate::infra::store::{BlobStore, MemoryBlobStore};

/// Builder for [`CentralWorkQueue`].
///
/// Every collaborator has a default: an in-memory blob store, an empty task
/// registry, a no-op identity binder, and a worker count derived from the
/// [`WorkerCountPolicy`]. Hosts override the pieces they care about.
#[derive(Default)]
pub struct CentralWorkQueueBuilder {
    workers: Option<usize>,
    registry: Option<Arc<dyn TaskRegistry>>,
    binder: Option<Arc<dyn IdentityBinder>>,
    store: Option<Arc<dyn BlobStore>>,
}

impl CentralWorkQueueBuilder {
    /// Start with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the worker count instead of consulting the policy.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Use the given task registry for injected task references.
    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn TaskRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use the given identity binder for units carrying a principal.
    #[must_use]
    pub fn identity_binder(mut self, binder: Arc<dyn IdentityBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Persist pending units into the given blob store.
    #[must_use]
    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the queue, draining previously persisted units before any
    /// worker starts.
    ///
    /// # Errors
    ///
    /// Propagates store-wide I/O failures encountered while draining the
    /// durable store.
    pub fn build(self) -> Result<CentralWorkQueue, StoreError> {
        let workers = self
            .workers
            .unwrap_or_else(|| WorkerCountPolicy::from_env().worker_count());
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(FactoryRegistry::new()));
        let binder = self.binder.unwrap_or_else(|| Arc::new(NoopIdentityBinder));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryBlobStore::new()));

        CentralWorkQueue::new(workers, registry, binder, DurableStore::new(store))
    }
}
