//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! append-only stores implement.

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::UpdateRecord;

/// Trait for append-only record stores
///
/// The storage actor is the only writer, so methods take `&mut self`.
///
/// ## Atomicity
///
/// `append` either writes the complete record or fails; a record is never
/// written partially. The actor relies on this when it retries a failed append.
#[async_trait]
pub trait StorageBackend: Send {
    /// Append one record at the end of the store
    async fn append(&mut self, record: &UpdateRecord) -> StorageResult<()>;

    /// Push buffered data down to the underlying medium
    async fn flush(&mut self) -> StorageResult<()>;

    /// Close the backend and release resources
    ///
    /// Flushes any pending writes. Appends after closing fail with
    /// [`StorageError::Closed`](super::StorageError::Closed).
    async fn close(&mut self) -> StorageResult<()>;

    /// Short human-readable description (e.g. "jsonl: ./history.log")
    fn describe(&self) -> String;
}
