//! Simulated smart-home devices
//!
//! A device is described by an immutable [`DeviceIdentity`] and a mutable
//! [`DeviceState`] which only its own device actor ever writes to. The state is a
//! closed enum over the supported kinds; each kind has a pure step function in
//! [`model`] that derives the next snapshot from the previous one plus randomness.

pub mod model;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use model::{BulbState, CameraState, DeviceState, ThermostatState};

/// Kind of a simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceKind {
    Bulb,
    Thermostat,
    Camera,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Bulb => "BULB",
            DeviceKind::Thermostat => "THERMOSTAT",
            DeviceKind::Camera => "CAMERA",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a device in the fleet
///
/// Created once when the fleet is assembled and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Unique device identifier (e.g. "t1")
    pub id: String,

    pub kind: DeviceKind,

    /// Human readable name used in logs and alerts
    pub display_name: String,

    /// Room or area the device is installed in
    pub location: Option<String>,
}

impl DeviceIdentity {
    pub fn new(id: impl Into<String>, kind: DeviceKind, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            display_name: display_name.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Location if known, otherwise the display name
    pub fn whereabouts(&self) -> &str {
        self.location.as_deref().unwrap_or(&self.display_name)
    }
}
