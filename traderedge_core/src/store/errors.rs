//! Persistent store error types.

use thiserror::Error;

/// Persistent store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing file could not be read or written
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A writer panicked while holding the storage lock
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result type for persistent store operations
pub type StoreResult<T> = Result<T, StoreError>;
