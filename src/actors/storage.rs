//! StorageActor - Persists every update to an append-only store
//!
//! ## Queue
//!
//! The actor drains its own bounded bus queue in FIFO order and appends one
//! record per update. With the default `block` overflow policy nothing is ever
//! dropped: a stalled store first fills the queue, and only then does it slow
//! the producers down.
//!
//! ## Failures
//!
//! A failed append is retried with exponential backoff. After the last attempt
//! the record is given up on and counted as failed; alerting and analytics are
//! unaffected since they never depend on storage.
//!
//! ## Shutdown
//!
//! ```text
//! Running ──cancel──► Draining ──queue closed & empty──► close backend ──► Stopped
//! ```
//!
//! Cancellation does not stop the worker by itself. It switches it to draining,
//! which only changes what is logged and counted: the worker keeps consuming and
//! stops once the bus closes, that is when every device has exited and the queue
//! is empty. Updates that were already accepted are therefore always written. An
//! append in progress is never interrupted.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::bus::Subscription;
use crate::config::RetryConfig;
use crate::storage::{StorageBackend, UpdateRecord};

use super::messages::{StorageCommand, StorageStats, UpdateEvent};

/// Storage actor owning the backend
pub struct StorageActor {
    /// Only writer of the backend
    backend: Box<dyn StorageBackend>,

    /// Updates from the bus
    updates: Subscription,

    /// Command receiver
    command_rx: mpsc::Receiver<StorageCommand>,

    cancel: CancellationToken,

    retry: RetryConfig,

    stats: StorageStats,
}

impl StorageActor {
    pub fn new(
        command_rx: mpsc::Receiver<StorageCommand>,
        updates: Subscription,
        backend: Box<dyn StorageBackend>,
        retry: RetryConfig,
        cancel: CancellationToken,
    ) -> Self {
        debug!("creating storage actor ({})", backend.describe());

        Self {
            backend,
            updates,
            command_rx,
            cancel,
            retry,
            stats: StorageStats::default(),
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) -> StorageStats {
        debug!("starting storage actor");

        // Some(n) once cancelled, n being the records written since
        let mut drained: Option<u64> = None;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled(), if drained.is_none() => {
                    debug!(
                        "stop requested, draining {} queued updates",
                        self.updates.queued()
                    );
                    drained = Some(0);
                }

                update = self.updates.recv() => {
                    match update {
                        Some(event) => {
                            self.store(&event).await;
                            if let Some(count) = drained.as_mut() {
                                *count += 1;
                            }
                        }
                        None => {
                            debug!("update queue closed and empty");
                            break;
                        }
                    }
                }

                // Handle commands
                Some(cmd) = self.command_rx.recv() => {
                    self.handle_command(cmd).await;
                }
            }
        }

        if let Some(count) = drained {
            debug!("drained {count} updates after the stop request");
        }
        self.stats.drained = drained.unwrap_or(0);

        let dropped = self.updates.dropped();
        if dropped > 0 {
            warn!("{dropped} updates never reached storage (queue full)");
        }

        if let Err(e) = self.backend.close().await {
            error!("error closing backend: {}", e);
        }

        info!(
            "storage actor stopped ({} written, {} failed, {} retries)",
            self.stats.written, self.stats.failed, self.stats.retries
        );

        self.stats
    }

    /// Append one update, retrying with backoff on failure
    async fn store(&mut self, event: &UpdateEvent) {
        trace!("storing update for {} at {}", event.device_id, event.timestamp);

        let record = UpdateRecord::from(event);
        let mut attempt = 1;

        loop {
            match self.backend.append(&record).await {
                Ok(()) => {
                    self.stats.written += 1;
                    return;
                }
                Err(e) if attempt < self.retry.max_attempts => {
                    let backoff = self.retry.backoff(attempt);
                    warn!(
                        "failed to append update for {} (attempt {attempt}/{}): {e}, retrying in {backoff:?}",
                        record.device_id, self.retry.max_attempts
                    );
                    self.stats.retries += 1;
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    error!(
                        "dropping update for {} after {attempt} attempts: {e}",
                        record.device_id
                    );
                    self.stats.failed += 1;
                    return;
                }
            }
        }
    }

    /// Handle a command
    async fn handle_command(&mut self, cmd: StorageCommand) {
        match cmd {
            StorageCommand::Flush { respond_to } => {
                debug!("manual flush requested");
                let result: anyhow::Result<()> = self.backend.flush().await.map_err(Into::into);
                if result.is_ok() {
                    self.stats.flush_count += 1;
                }
                let _ = respond_to.send(result);
            }

            StorageCommand::GetStats { respond_to } => {
                let _ = respond_to.send(self.stats);
            }
        }
    }
}

/// Handle for controlling the StorageActor
#[derive(Clone)]
pub struct StorageHandle {
    sender: mpsc::Sender<StorageCommand>,
}

impl StorageHandle {
    /// Spawn a new storage actor
    ///
    /// The returned task resolves to the final statistics once the queue has
    /// been drained and the backend closed.
    pub fn spawn(
        updates: Subscription,
        backend: Box<dyn StorageBackend>,
        retry: RetryConfig,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<StorageStats>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = StorageActor::new(cmd_rx, updates, backend, retry, cancel);
        let task = tokio::spawn(actor.run());

        (Self { sender: cmd_tx }, task)
    }

    /// Manually flush the backend
    pub async fn flush(&self) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StorageCommand::Flush { respond_to: tx })
            .await?;

        rx.await??;
        Ok(())
    }

    /// Get storage statistics
    pub async fn get_stats(&self) -> Option<StorageStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StorageCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }
}
