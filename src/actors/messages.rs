//! Message types for actor communication
//!
//! This module defines all message types used for communication between actors.
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to specific actors via mpsc
//! 2. **Events**: Updates fanned out to every consumer through the [`UpdateBus`](crate::bus::UpdateBus)
//! 3. **Immutability**: Update events are shared behind an `Arc` and never mutated

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::analytics::AnalyticsAccumulator;
use crate::devices::{DeviceKind, DeviceState, model::DeviceAction};

/// Status update emitted by a device on every tick
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvent {
    /// Identifier of the emitting device
    pub device_id: String,

    pub kind: DeviceKind,

    /// Display name of the device (for logging/alerts)
    pub display_name: String,

    /// Where the device is installed
    pub location: Option<String>,

    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,

    /// Copy of the device state at emission time
    pub state: DeviceState,
}

/// An update shared read-only between all consumers
pub type SharedUpdate = Arc<UpdateEvent>;

/// Commands that can be sent to a DeviceActor
#[derive(Debug)]
pub enum DeviceCommand {
    /// Apply a state change (turn on, cool down, snapshot, ...)
    Apply { action: DeviceAction },

    /// Emit an update immediately (bypassing the interval timer)
    ///
    /// Used for testing and manual refresh operations.
    EmitNow {
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    /// Stop the device loop
    ///
    /// The actor finishes the update in flight and then exits.
    Shutdown,
}

/// Commands that can be sent to the AlertActor
#[derive(Debug)]
pub enum AlertCommand {
    /// Get the alert counters
    GetStats {
        respond_to: oneshot::Sender<AlertStats>,
    },

    /// Stop surfacing alerts (evaluation counters keep running)
    Mute,

    Unmute,

    /// Gracefully shut down the alert actor
    Shutdown,
}

/// Alert actor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertStats {
    /// Updates evaluated against the rules
    pub evaluated: u64,

    /// Alerts raised (surfaced or muted)
    pub raised: u64,
}

/// Commands that can be sent to the StorageActor
#[derive(Debug)]
pub enum StorageCommand {
    /// Flush the sink
    Flush {
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    /// Get storage statistics
    GetStats {
        respond_to: oneshot::Sender<StorageStats>,
    },
}

/// Storage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Records appended to the sink
    pub written: u64,

    /// Records given up on after all retries
    pub failed: u64,

    /// Retry attempts performed
    pub retries: u64,

    /// Number of flush operations performed
    pub flush_count: u64,

    /// Updates taken off the queue after the stop request
    pub drained: u64,
}

/// Commands that can be sent to the AnalyticsActor
#[derive(Debug)]
pub enum AnalyticsCommand {
    /// Copy of the accumulator as it is right now
    Snapshot {
        respond_to: oneshot::Sender<AnalyticsAccumulator>,
    },
}
