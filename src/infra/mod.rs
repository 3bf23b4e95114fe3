//! Infrastructure adapters: the backing blob store and the durable store
//! built on top of it.

pub mod persistence;
pub mod store;

pub use persistence::DurableStore;
pub use store::{BlobStore, FileBlobStore, MemoryBlobStore};
