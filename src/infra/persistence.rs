//! Durable store for not-yet-started units of work.
//!
//! Encodes units as self-describing JSON entries in a [`BlobStore`]. Decode
//! is an explicit per-entry step whose failures are filtered out before the
//! loaded list is returned; one poison entry never prevents the rest from
//! loading, and a task without a serialized form never fails a persistence
//! batch. Only store-wide I/O failures propagate.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::unit::{StoredUnit, UnitOfWork};
use crate::core::StoreError;
use crate::infra::store::BlobStore;

/// Key prefix marking entries owned by this store. Blobs under other keys
/// belong to subsystems sharing the namespace and are never touched.
const KEY_PREFIX: &str = "unit-";

/// Crash-survivable repository of not-yet-started units of work.
pub struct DurableStore {
    store: Arc<dyn BlobStore>,
}

impl DurableStore {
    /// Create a durable store over the given blob store.
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    fn key_for(order: u64) -> String {
        format!("{KEY_PREFIX}{order:020}")
    }

    /// Serialize and write one unit of work.
    ///
    /// A unit whose task has no serialized form is skipped silently; it can
    /// run in this process but cannot survive a restart, and dropping it
    /// must not abort a batch of otherwise-storable siblings.
    ///
    /// # Errors
    ///
    /// Propagates only backing-store I/O failures.
    pub fn store(&self, unit: &UnitOfWork) -> Result<(), StoreError> {
        let Some(stored) = unit.to_stored() else {
            warn!(
                order = unit.order(),
                task = ?unit.task(),
                "unit of work has no serialized form, skipping persistence"
            );
            return Ok(());
        };
        let bytes = match serde_json::to_vec(&stored) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(order = unit.order(), %err, "failed to encode unit of work, skipping");
                return Ok(());
            }
        };
        self.store.put(&Self::key_for(stored.order), &bytes)
    }

    /// Load every stored unit, ascending by persisted order, removing each
    /// entry as it is read: a second call returns nothing new.
    ///
    /// Entries that fail to decode are skipped individually. Undecodable
    /// entries under this store's own key prefix are deleted so they do not
    /// reappear; foreign blobs are left in place.
    ///
    /// # Errors
    ///
    /// Propagates only backing-store I/O failures.
    pub fn load_all(&self) -> Result<Vec<UnitOfWork>, StoreError> {
        let mut loaded = Vec::new();
        for key in self.store.keys()? {
            let Some(bytes) = self.store.get(&key)? else {
                continue;
            };
            match serde_json::from_slice::<StoredUnit>(&bytes) {
                Ok(stored) => {
                    self.store.remove(&key)?;
                    loaded.push(stored);
                }
                Err(err) if key.starts_with(KEY_PREFIX) => {
                    warn!(%key, %err, "removing undecodable unit-of-work entry");
                    self.store.remove(&key)?;
                }
                Err(_) => {
                    debug!(%key, "skipping foreign entry in shared store");
                }
            }
        }
        loaded.sort_by_key(|stored| stored.order);
        Ok(loaded.into_iter().map(UnitOfWork::from_stored).collect())
    }

    /// Delete the stored representation of `unit`, a no-op if absent.
    ///
    /// # Errors
    ///
    /// Propagates only backing-store I/O failures.
    pub fn remove(&self, unit: &UnitOfWork) -> Result<(), StoreError> {
        self.store.remove(&Self::key_for(unit.order()))
    }
}
