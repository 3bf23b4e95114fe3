//! Backing blob store abstraction and backends.
//!
//! The durable store encodes units of work itself; the blob store only moves
//! opaque byte payloads under string keys. The namespace may be shared with
//! unrelated subsystems, so consumers must tolerate foreign blobs.

pub mod file;
pub mod memory;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;

use crate::core::StoreError;

/// A key-addressable binary blob repository.
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `key`, replacing any previous payload.
    ///
    /// # Errors
    ///
    /// Fails only when the backing store itself is unavailable.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Read the payload stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Fails only when the backing store itself is unavailable.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Enumerate every key currently present, in no particular order.
    ///
    /// # Errors
    ///
    /// Fails only when the backing store itself is unavailable.
    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Delete the payload stored under `key`, a no-op if absent.
    ///
    /// # Errors
    ///
    /// Fails only when the backing store itself is unavailable.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
