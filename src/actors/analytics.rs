//! AnalyticsActor - Folds the update stream into running statistics
//!
//! The accumulator lives inside the actor and is never shared; other tasks can
//! only ask for a copy. When the bus closes the final accumulator is returned
//! through the task's `JoinHandle`.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::analytics::AnalyticsAccumulator;
use crate::bus::Subscription;

use super::messages::AnalyticsCommand;

pub struct AnalyticsActor {
    command_rx: mpsc::Receiver<AnalyticsCommand>,
    updates: Subscription,
    accumulator: AnalyticsAccumulator,
}

impl AnalyticsActor {
    pub fn new(command_rx: mpsc::Receiver<AnalyticsCommand>, updates: Subscription) -> Self {
        Self {
            command_rx,
            updates,
            accumulator: AnalyticsAccumulator::new(),
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) -> AnalyticsAccumulator {
        debug!("starting analytics actor");

        loop {
            tokio::select! {
                update = self.updates.recv() => {
                    match update {
                        Some(event) => self.accumulator.record(&event),
                        None => {
                            debug!("update bus closed");
                            break;
                        }
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        AnalyticsCommand::Snapshot { respond_to } => {
                            let _ = respond_to.send(self.accumulator);
                        }
                    }
                }
            }
        }

        debug!(
            "analytics actor stopped after {} updates",
            self.accumulator.total_updates
        );
        self.accumulator
    }
}

/// Handle for querying the AnalyticsActor
#[derive(Clone)]
pub struct AnalyticsHandle {
    sender: mpsc::Sender<AnalyticsCommand>,
}

impl AnalyticsHandle {
    /// Spawn a new analytics actor
    ///
    /// The returned task resolves to the final accumulator once the bus closes.
    pub fn spawn(updates: Subscription) -> (Self, JoinHandle<AnalyticsAccumulator>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = AnalyticsActor::new(cmd_rx, updates);
        let task = tokio::spawn(actor.run());

        (Self { sender: cmd_tx }, task)
    }

    /// Copy of the accumulator as of now
    pub async fn snapshot(&self) -> Option<AnalyticsAccumulator> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AnalyticsCommand::Snapshot { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }
}
