//! Alert rules
//!
//! Rules are stateless predicates over a single update. The alert actor surfaces
//! whatever [`evaluate`] returns, and the analytics fold uses [`is_critical`] to
//! count the same conditions without sharing any state with the alert actor.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actors::messages::UpdateEvent;
use crate::devices::DeviceState;

/// Thermostat readings above this raise a high temperature alert (°C)
pub const HIGH_TEMPERATURE_LIMIT: f64 = 30.0;

/// Camera battery below this raises a low battery warning (%)
pub const LOW_BATTERY_LIMIT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Alert,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Alert => f.write_str("ALERT"),
            Severity::Warning => f.write_str("WARNING"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighTemperature,
    MotionDetected,
    LowBattery,
}

impl AlertKind {
    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::HighTemperature | AlertKind::MotionDetected => Severity::Alert,
            AlertKind::LowBattery => Severity::Warning,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AlertKind::HighTemperature => "HIGH TEMPERATURE",
            AlertKind::MotionDetected => "MOTION DETECTED",
            AlertKind::LowBattery => "LOW BATTERY",
        }
    }
}

/// An alert raised for a single update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub severity: Severity,
    pub kind: AlertKind,
    pub device_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for AlertRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Triggered rule kinds for a state, in rule order
pub fn triggered(state: &DeviceState) -> Vec<AlertKind> {
    let mut kinds = vec![];

    match state {
        DeviceState::Thermostat(thermostat) => {
            if thermostat.current_temp > HIGH_TEMPERATURE_LIMIT {
                kinds.push(AlertKind::HighTemperature);
            }
        }
        DeviceState::Camera(camera) => {
            if camera.motion_detected {
                kinds.push(AlertKind::MotionDetected);
            }
            if camera.battery_level < LOW_BATTERY_LIMIT {
                kinds.push(AlertKind::LowBattery);
            }
        }
        DeviceState::Bulb(_) => {}
    }

    kinds
}

/// Whether any rule fires for the update
pub fn is_critical(event: &UpdateEvent) -> bool {
    !triggered(&event.state).is_empty()
}

/// Evaluate all rules against an update
pub fn evaluate(event: &UpdateEvent) -> Vec<AlertRecord> {
    triggered(&event.state)
        .into_iter()
        .map(|kind| AlertRecord {
            severity: kind.severity(),
            kind,
            device_id: event.device_id.clone(),
            message: describe(kind, event),
            timestamp: event.timestamp,
        })
        .collect()
}

fn describe(kind: AlertKind, event: &UpdateEvent) -> String {
    let place = event.location.as_deref().unwrap_or(&event.display_name);

    match (&event.state, kind) {
        (DeviceState::Thermostat(thermostat), AlertKind::HighTemperature) => format!(
            "{} at {} ({:.1}°C > {HIGH_TEMPERATURE_LIMIT:.1}°C)",
            kind.title(),
            place,
            thermostat.current_temp
        ),
        (DeviceState::Camera(camera), AlertKind::LowBattery) => format!(
            "{} on {} ({:.1}%)",
            kind.title(),
            event.display_name,
            camera.battery_level
        ),
        _ => format!("{} at {}", kind.title(), place),
    }
}
