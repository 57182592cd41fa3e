//! Per-kind device models
//!
//! Every step function is pure: it takes the previous state, a random source and
//! the current time, and returns the next state. Range invariants are enforced by
//! clamping here, so an out-of-range value can never leave a model.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::DeviceKind;

/// Upper bound for brightness, humidity and battery percentages
pub const PERCENT_MAX: f64 = 100.0;

/// Temperature the thermostat cools down to
pub const COMFORT_TEMPERATURE: f64 = 22.0;

/// Physical range reported by the thermostat sensor (°C)
const SENSOR_MIN_TEMP: f64 = -20.0;
const SENSOR_MAX_TEMP: f64 = 50.0;

/// Probability that a bulb is switched on/off between two ticks
const BULB_TOGGLE_PROBABILITY: f64 = 0.05;

/// Probability that a camera detects motion on a tick
const MOTION_PROBABILITY: f64 = 0.15;

/// Extra battery drain when a motion triggers a recording
const MOTION_DRAIN: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulbState {
    pub is_on: bool,
    pub brightness: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermostatState {
    pub current_temp: f64,
    pub target_temp: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub motion_detected: bool,
    pub battery_level: f64,
    pub last_snapshot: Option<DateTime<Utc>>,
}

/// Snapshot of a device's state
///
/// Serialized untagged so the kind-specific fields sit flat next to the record
/// metadata in the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceState {
    Bulb(BulbState),
    Thermostat(ThermostatState),
    Camera(CameraState),
}

/// State changes that can be requested from outside a device actor
///
/// They are applied by the device actor itself, the state keeps a single writer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceAction {
    /// Switch a bulb on at the given brightness
    TurnOn { brightness: u8 },

    TurnOff,

    /// Reset a thermostat to the comfort temperature
    CoolDown,

    /// Take a camera snapshot
    Snapshot,
}

impl DeviceState {
    /// Initial state of a freshly connected device
    pub fn initial<R: Rng + ?Sized>(kind: DeviceKind, rng: &mut R) -> Self {
        match kind {
            DeviceKind::Bulb => DeviceState::Bulb(BulbState {
                is_on: true,
                brightness: 80,
            }),
            DeviceKind::Thermostat => DeviceState::Thermostat(ThermostatState {
                current_temp: round_tenth(rng.gen_range(20.0..28.0)),
                target_temp: COMFORT_TEMPERATURE,
                humidity: 50.0,
            }),
            DeviceKind::Camera => DeviceState::Camera(CameraState {
                motion_detected: false,
                battery_level: PERCENT_MAX,
                last_snapshot: None,
            }),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceState::Bulb(_) => DeviceKind::Bulb,
            DeviceState::Thermostat(_) => DeviceKind::Thermostat,
            DeviceState::Camera(_) => DeviceKind::Camera,
        }
    }

    /// Compute the state for the next tick
    pub fn step<R: Rng + ?Sized>(&self, rng: &mut R, now: DateTime<Utc>) -> Self {
        match self {
            DeviceState::Bulb(bulb) => DeviceState::Bulb(step_bulb(bulb, rng)),
            DeviceState::Thermostat(thermostat) => {
                DeviceState::Thermostat(step_thermostat(thermostat, rng))
            }
            DeviceState::Camera(camera) => DeviceState::Camera(step_camera(camera, rng, now)),
        }
    }

    /// Apply an external action
    ///
    /// Returns `false` if the action does not apply to this kind of device.
    pub fn apply(&mut self, action: DeviceAction, now: DateTime<Utc>) -> bool {
        match (self, action) {
            (DeviceState::Bulb(bulb), DeviceAction::TurnOn { brightness }) => {
                bulb.is_on = true;
                bulb.brightness = brightness.min(PERCENT_MAX as u8);
                true
            }
            (DeviceState::Bulb(bulb), DeviceAction::TurnOff) => {
                bulb.is_on = false;
                true
            }
            (DeviceState::Thermostat(thermostat), DeviceAction::CoolDown) => {
                thermostat.current_temp = COMFORT_TEMPERATURE;
                thermostat.target_temp = COMFORT_TEMPERATURE;
                true
            }
            (DeviceState::Camera(camera), DeviceAction::Snapshot) => {
                camera.last_snapshot = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Check the range invariants of the state
    pub fn is_within_bounds(&self) -> bool {
        match self {
            DeviceState::Bulb(bulb) => f64::from(bulb.brightness) <= PERCENT_MAX,
            DeviceState::Thermostat(thermostat) => {
                is_percent(thermostat.humidity)
                    && (SENSOR_MIN_TEMP..=SENSOR_MAX_TEMP).contains(&thermostat.current_temp)
            }
            DeviceState::Camera(camera) => is_percent(camera.battery_level),
        }
    }
}

fn step_bulb<R: Rng + ?Sized>(previous: &BulbState, rng: &mut R) -> BulbState {
    let mut next = previous.clone();

    if rng.gen_bool(BULB_TOGGLE_PROBABILITY) {
        next.is_on = !next.is_on;
    }

    if next.is_on {
        let jitter: i16 = rng.gen_range(-10..=10);
        next.brightness = (i16::from(next.brightness) + jitter).clamp(0, PERCENT_MAX as i16) as u8;
    }

    next
}

fn step_thermostat<R: Rng + ?Sized>(previous: &ThermostatState, rng: &mut R) -> ThermostatState {
    let drift: f64 = rng.gen_range(-1.0..2.0);
    let humidity_drift: f64 = rng.gen_range(-1.0..1.0);

    ThermostatState {
        current_temp: round_tenth(
            (previous.current_temp + drift).clamp(SENSOR_MIN_TEMP, SENSOR_MAX_TEMP),
        ),
        target_temp: previous.target_temp,
        humidity: round_tenth(clamp_percent(previous.humidity + humidity_drift)),
    }
}

fn step_camera<R: Rng + ?Sized>(
    previous: &CameraState,
    rng: &mut R,
    now: DateTime<Utc>,
) -> CameraState {
    let motion_detected = rng.gen_bool(MOTION_PROBABILITY);
    let mut battery_level = previous.battery_level - rng.gen_range(5.0..12.0);
    let mut last_snapshot = previous.last_snapshot;

    if motion_detected {
        last_snapshot = Some(now);
        battery_level -= MOTION_DRAIN;
    }

    CameraState {
        motion_detected,
        battery_level: round_tenth(clamp_percent(battery_level)),
        last_snapshot,
    }
}

fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, PERCENT_MAX)
}

fn is_percent(value: f64) -> bool {
    (0.0..=PERCENT_MAX).contains(&value)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
