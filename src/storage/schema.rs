//! Persisted record format
//!
//! Every update becomes one self-contained JSON object on its own line:
//!
//! ```text
//! {"device_id":"t1","name":"Smart Thermostat","location":"Main Room","kind":"THERMOSTAT","timestamp":"2024-05-01T12:00:00Z","current_temp":24.3,"target_temp":22.0,"humidity":50.0}
//! ```
//!
//! The kind-specific state fields are flattened into the record, so the file can
//! be read without knowing the Rust types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actors::messages::UpdateEvent;
use crate::devices::{DeviceKind, DeviceState};

/// A single persisted update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub device_id: String,

    /// Display name of the device
    pub name: String,

    pub location: Option<String>,

    pub kind: DeviceKind,

    /// When the update was emitted (always UTC, RFC 3339 on disk)
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub state: DeviceState,
}

impl From<&UpdateEvent> for UpdateRecord {
    fn from(event: &UpdateEvent) -> Self {
        Self {
            device_id: event.device_id.clone(),
            name: event.display_name.clone(),
            location: event.location.clone(),
            kind: event.kind,
            timestamp: event.timestamp,
            state: event.state.clone(),
        }
    }
}

impl UpdateRecord {
    /// Encode the record as a single JSON line (without the newline)
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
