//! AlertActor - Evaluates updates and surfaces alerts
//!
//! Rules are stateless (see [`crate::alerts`]): every update is judged on its own,
//! so the actor keeps nothing but counters. Alerts are logged and published on a
//! broadcast channel for presentation layers; publishing never waits, and a
//! lagging alert subscriber only misses alerts, it never slows the evaluation.
//!
//! ## Remediation
//!
//! When a thermostat reports a high temperature, the actor can ask that device
//! to cool down. The command is queued with `try_send`, so a busy device never
//! stalls alert evaluation.

use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::alerts::{self, AlertKind, AlertRecord};
use crate::bus::Subscription;
use crate::devices::model::DeviceAction;

use super::device::DeviceHandle;
use super::messages::{AlertCommand, AlertStats, UpdateEvent};

/// Actor that evaluates updates and raises alerts
pub struct AlertActor {
    /// Command receiver
    command_rx: mpsc::Receiver<AlertCommand>,

    /// Updates from the bus
    updates: Subscription,

    /// Alert stream for presentation layers
    alert_tx: broadcast::Sender<AlertRecord>,

    /// Devices that can be told to react to their own alerts
    remediation: HashMap<String, DeviceHandle>,

    /// Whether alerts are muted
    muted: bool,

    stats: AlertStats,
}

impl AlertActor {
    /// Create a new alert actor
    pub fn new(
        command_rx: mpsc::Receiver<AlertCommand>,
        updates: Subscription,
        alert_tx: broadcast::Sender<AlertRecord>,
    ) -> Self {
        Self {
            command_rx,
            updates,
            alert_tx,
            remediation: HashMap::new(),
            muted: false,
            stats: AlertStats::default(),
        }
    }

    /// Register a device that should receive remediation commands
    pub fn register_device(&mut self, handle: DeviceHandle) {
        self.remediation.insert(handle.device_id.clone(), handle);
    }

    /// Run the actor's main loop
    ///
    /// Runs until the update bus is closed (all devices gone) or a Shutdown
    /// command is received. Returns the final counters.
    #[instrument(skip(self))]
    pub async fn run(mut self) -> AlertStats {
        debug!("starting alert actor");

        loop {
            tokio::select! {
                update = self.updates.recv() => {
                    match update {
                        Some(event) => self.handle_update(&event),
                        None => {
                            debug!("update bus closed, shutting down");
                            break;
                        }
                    }
                }

                // Handle commands
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        AlertCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats);
                        }

                        AlertCommand::Mute => {
                            debug!("muting alerts");
                            self.muted = true;
                        }

                        AlertCommand::Unmute => {
                            debug!("unmuting alerts");
                            self.muted = false;
                        }

                        AlertCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        debug!(
            "alert actor stopped ({} updates evaluated, {} alerts raised)",
            self.stats.evaluated, self.stats.raised
        );
        self.stats
    }

    /// Evaluate one update against all rules
    #[instrument(skip(self, event), fields(device_id = %event.device_id))]
    fn handle_update(&mut self, event: &UpdateEvent) {
        self.stats.evaluated += 1;

        for record in alerts::evaluate(event) {
            self.stats.raised += 1;

            if record.kind == AlertKind::HighTemperature {
                self.remediate(&event.device_id);
            }

            if self.muted {
                trace!("muted: {record}");
                continue;
            }

            warn!(kind = ?record.kind, "{record}");

            // Nobody listening is fine, the alert has been logged
            if self.alert_tx.send(record).is_err() {
                trace!("no receivers for alert (this is OK)");
            }
        }
    }

    fn remediate(&self, device_id: &str) {
        let Some(device) = self.remediation.get(device_id) else {
            return;
        };

        if device.try_apply(DeviceAction::CoolDown) {
            info!("triggering cooling on {device_id}");
        } else {
            warn!("could not queue cool down for {device_id}");
        }
    }
}

/// Handle for controlling the AlertActor
#[derive(Clone)]
pub struct AlertHandle {
    sender: mpsc::Sender<AlertCommand>,
}

impl AlertHandle {
    /// Spawn a new alert actor
    ///
    /// # Arguments
    /// - `updates`: Bus subscription delivering device updates
    /// - `alert_tx`: Broadcast sender the alerts are published on
    /// - `remediation`: Devices that get remediation commands (empty to disable)
    pub fn spawn(
        updates: Subscription,
        alert_tx: broadcast::Sender<AlertRecord>,
        remediation: Vec<DeviceHandle>,
    ) -> (Self, JoinHandle<AlertStats>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let mut actor = AlertActor::new(cmd_rx, updates, alert_tx);
        for device in remediation {
            actor.register_device(device);
        }

        let task = tokio::spawn(actor.run());

        (Self { sender: cmd_tx }, task)
    }

    /// Get the alert counters
    pub async fn get_stats(&self) -> Option<AlertStats> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(AlertCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Mute alerts
    pub async fn mute(&self) {
        let _ = self.sender.send(AlertCommand::Mute).await;
    }

    /// Unmute alerts
    pub async fn unmute(&self) {
        let _ = self.sender.send(AlertCommand::Unmute).await;
    }

    /// Shutdown the alert actor
    pub async fn shutdown(&self) {
        let _ = self.sender.send(AlertCommand::Shutdown).await;
    }
}
