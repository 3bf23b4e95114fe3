//! Error types for queue and persistence operations.

use thiserror::Error;

/// Errors produced by the backing object store.
///
/// Per-entry problems (a task without a serializable form, a corrupt stored
/// entry) are absorbed and logged inside the durable store; only store-wide
/// I/O failures surface through this type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store itself is unavailable or failed at the I/O level.
    #[error("backing store unavailable: {0}")]
    Io(#[from] std::io::Error),
    /// Failure reported by a blob-store backend with its own error domain,
    /// such as a network store or a host-supplied implementation.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Application-facing result using anyhow for task bodies and registries.
pub type AppResult<T> = Result<T, anyhow::Error>;
