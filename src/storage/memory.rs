//! In-memory storage backend (no persistence)
//!
//! Records are kept in a shared vector. Clones of the backend share the same
//! records, so a test can hand one clone to the storage actor and inspect the
//! other. It also supports injecting failures and write latency to exercise the
//! actor's retry and drain behaviour.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::schema::UpdateRecord;

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<UpdateRecord>,
    failures_left: usize,
    closed: bool,
}

/// In-memory storage backend
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    latency: Option<Duration>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every append by `latency` (simulates slow storage)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `count` appends fail
    pub fn fail_next(&self, count: usize) {
        self.lock().failures_left = count;
    }

    /// Copy of all records appended so far, in append order
    pub fn records(&self) -> Vec<UpdateRecord> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // a poisoned lock only means a test panicked mid-append
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn append(&mut self, record: &UpdateRecord) -> StorageResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if state.closed {
            return Err(StorageError::Closed);
        }
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(StorageError::Rejected("injected failure".to_string()));
        }

        state.records.push(record.clone());
        Ok(())
    }

    async fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> StorageResult<()> {
        debug!("closing in-memory backend");
        self.lock().closed = true;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory: {} records", self.len())
    }
}
