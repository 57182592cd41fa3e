//! DeviceActor - Drives the lifecycle of one simulated device
//!
//! Each device gets its own actor task. The actor owns the device state
//! exclusively; other actors can only ask for changes through commands.
//!
//! ## Message Flow
//!
//! ```text
//! connect delay → [step model → publish UpdateEvent → random sleep]* → stop
//!                                     ↓
//!                      UpdateBus → [AlertActor, StorageActor, AnalyticsActor]
//!     ↑
//!     └─── Commands (Apply, EmitNow, Shutdown) + shared cancellation token
//! ```
//!
//! The connect delay and the inter-update sleep are the only suspension points,
//! and both are interrupted by the cancellation token. Publishing an update is
//! never interrupted, so a device never emits a partial update.

use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::bus::{BusError, UpdateBus};
use crate::config::TimingConfig;
use crate::devices::{DeviceIdentity, DeviceKind, DeviceState, model::DeviceAction};

use super::messages::{DeviceCommand, UpdateEvent};

/// Outcome of a device loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceReport {
    pub device_id: String,

    /// Updates accepted by the bus
    pub emitted: u64,
}

/// Why a device loop stopped emitting
enum Stop {
    Cancelled,
    Shutdown,
    Bus(BusError),
}

/// Actor simulating a single device
pub struct DeviceActor {
    identity: DeviceIdentity,

    /// Current state, written only by this actor
    state: DeviceState,

    rng: StdRng,

    timing: TimingConfig,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<DeviceCommand>,

    /// Publishing side of the update bus
    bus: UpdateBus,

    cancel: CancellationToken,

    emitted: u64,
}

impl DeviceActor {
    /// Create a new device actor
    pub fn new(
        identity: DeviceIdentity,
        seed: Option<u64>,
        timing: TimingConfig,
        command_rx: mpsc::Receiver<DeviceCommand>,
        bus: UpdateBus,
        cancel: CancellationToken,
    ) -> Self {
        let mut rng = device_rng(seed, &identity.id);
        let state = DeviceState::initial(identity.kind, &mut rng);

        Self {
            identity,
            state,
            rng,
            timing,
            command_rx,
            bus,
            cancel,
            emitted: 0,
        }
    }

    /// Run the actor's main loop
    ///
    /// This is the entry point for the actor. It runs until:
    /// - The cancellation token is triggered
    /// - A Shutdown command is received or the command channel is closed
    /// - The bus rejects an update (event limit reached, no consumers left)
    #[instrument(skip(self), fields(device = %self.identity.id))]
    pub async fn run(mut self) -> DeviceReport {
        let stop = match self.connect().await {
            Ok(()) => self.update_loop().await,
            Err(stop) => stop,
        };

        match stop {
            Stop::Cancelled => debug!("cancelled"),
            Stop::Shutdown => debug!("received shutdown command"),
            Stop::Bus(BusError::LimitReached(limit)) => {
                debug!("event limit of {limit} reached")
            }
            Stop::Bus(BusError::Closed) => warn!("no consumer left on the update bus"),
        }

        debug!("device actor stopped after {} updates", self.emitted);

        DeviceReport {
            device_id: self.identity.id,
            emitted: self.emitted,
        }
    }

    /// Simulated network handshake
    async fn connect(&mut self) -> Result<(), Stop> {
        let delay = self.random_duration(self.timing.connect_min_ms, self.timing.connect_max_ms);
        debug!("{} -> connecting...", self.identity.display_name);

        tokio::select! {
            _ = self.cancel.cancelled() => Err(Stop::Cancelled),
            _ = tokio::time::sleep(delay) => {
                info!(
                    "{} ({}) connected in {:.2}s",
                    self.identity.display_name,
                    self.identity.whereabouts(),
                    delay.as_secs_f64()
                );
                Ok(())
            }
        }
    }

    async fn update_loop(&mut self) -> Stop {
        loop {
            if self.cancel.is_cancelled() {
                return Stop::Cancelled;
            }

            if let Err(e) = self.emit().await {
                return Stop::Bus(e);
            }

            if self.cancel.is_cancelled() {
                return Stop::Cancelled;
            }

            let pause =
                self.random_duration(self.timing.interval_min_ms, self.timing.interval_max_ms);
            if let Err(stop) = self.pause(pause).await {
                return stop;
            }
        }
    }

    /// Sleep between two updates while serving commands
    async fn pause(&mut self, duration: Duration) -> Result<(), Stop> {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Err(Stop::Cancelled),

                _ = &mut sleep => return Ok(()),

                cmd = self.command_rx.recv() => match cmd {
                    Some(DeviceCommand::Apply { action }) => self.apply(action),

                    Some(DeviceCommand::EmitNow { respond_to }) => {
                        trace!("received EmitNow command");
                        let result = self.emit().await;
                        let stop = result.as_ref().err().cloned();
                        let _ = respond_to.send(result.context("failed to publish update"));
                        if let Some(e) = stop {
                            return Err(Stop::Bus(e));
                        }
                    }

                    Some(DeviceCommand::Shutdown) => return Err(Stop::Shutdown),

                    // Command channel closed - exit
                    None => {
                        warn!("command channel closed, shutting down");
                        return Err(Stop::Shutdown);
                    }
                },
            }
        }
    }

    fn apply(&mut self, action: DeviceAction) {
        if self.state.apply(action, Utc::now()) {
            info!("{} command executed: {action:?}", self.identity.kind);
        } else {
            trace!("{action:?} does not apply to a {}, ignoring", self.identity.kind);
        }
    }

    /// Step the model and publish the new state
    async fn emit(&mut self) -> Result<(), BusError> {
        let now = Utc::now();
        self.state = self.state.step(&mut self.rng, now);
        debug_assert!(self.state.is_within_bounds(), "model left its range");

        let event = UpdateEvent {
            device_id: self.identity.id.clone(),
            kind: self.identity.kind,
            display_name: self.identity.display_name.clone(),
            location: self.identity.location.clone(),
            timestamp: now,
            state: self.state.clone(),
        };

        let receivers = self.bus.publish(event).await?;
        self.emitted += 1;
        trace!("published update #{} to {receivers} consumers", self.emitted);

        Ok(())
    }

    fn random_duration(&mut self, min_ms: u64, max_ms: u64) -> Duration {
        Duration::from_millis(self.rng.gen_range(min_ms..=max_ms.max(min_ms)))
    }
}

/// Per-device random source
///
/// With a seed, each device gets its own reproducible stream derived from its id,
/// independent of the order the fleet is spawned in.
fn device_rng(seed: Option<u64>, device_id: &str) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ fnv1a(device_id.as_bytes())),
        None => StdRng::from_entropy(),
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Handle for controlling a DeviceActor
///
/// This handle provides a typed API for sending commands to the actor.
/// It can be cloned and shared across tasks.
#[derive(Clone)]
pub struct DeviceHandle {
    /// Command sender
    sender: mpsc::Sender<DeviceCommand>,

    pub device_id: String,

    pub kind: DeviceKind,
}

impl DeviceHandle {
    /// Spawn a new device actor
    ///
    /// Returns the handle and the task, which resolves to the device's report.
    pub fn spawn(
        identity: DeviceIdentity,
        seed: Option<u64>,
        timing: TimingConfig,
        bus: UpdateBus,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<DeviceReport>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let handle = Self {
            sender: cmd_tx,
            device_id: identity.id.clone(),
            kind: identity.kind,
        };

        let actor = DeviceActor::new(identity, seed, timing, cmd_rx, bus, cancel);
        let task = tokio::spawn(actor.run());

        (handle, task)
    }

    /// Request a state change
    pub async fn apply(&self, action: DeviceAction) -> anyhow::Result<()> {
        self.sender
            .send(DeviceCommand::Apply { action })
            .await
            .context("failed to send Apply command")?;
        Ok(())
    }

    /// Request a state change without waiting for room in the command queue
    ///
    /// Returns `false` if the command could not be queued.
    pub fn try_apply(&self, action: DeviceAction) -> bool {
        self.sender.try_send(DeviceCommand::Apply { action }).is_ok()
    }

    /// Emit an update immediately
    ///
    /// Only served once the device is connected.
    pub async fn emit_now(&self) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(DeviceCommand::EmitNow { respond_to: tx })
            .await
            .context("failed to send EmitNow command")?;

        rx.await.context("failed to receive response")??;
        Ok(())
    }

    /// Stop this device only
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.sender
            .send(DeviceCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
