//! Error types for storage operations

use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while appending records
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend has already been closed
    #[error("storage backend is closed")]
    Closed,

    /// The backend refused the write
    #[error("storage backend rejected the write: {0}")]
    Rejected(String),
}
