//! Helper functions for integration tests

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use smart_home_sim::{
    UpdateEvent,
    config::{DeviceConfig, RetryConfig, RunLimit, SimulationConfig, TimingConfig},
    devices::{CameraState, DeviceKind, DeviceState, ThermostatState},
    storage::UpdateRecord,
};

/// Roster built from `(id, kind)` pairs
pub fn roster(devices: &[(&str, DeviceKind)]) -> Vec<DeviceConfig> {
    devices
        .iter()
        .map(|(id, kind)| DeviceConfig {
            id: id.to_string(),
            kind: *kind,
            display: Some(format!("Test {id}")),
            location: Some("Test Lab".to_string()),
        })
        .collect()
}

/// Config with millisecond timings that stops after `max_events` updates
pub fn fast_config(devices: &[(&str, DeviceKind)], max_events: u64) -> SimulationConfig {
    let mut config = SimulationConfig {
        devices: roster(devices),
        run: RunLimit {
            duration_secs: None,
            max_events: Some(max_events),
        },
        seed: Some(1234),
        timing: TimingConfig::fixed_range(1, 4),
        ..SimulationConfig::default()
    };
    config.storage.retry = RetryConfig {
        max_attempts: 3,
        initial_backoff_ms: 1,
    };
    config
}

pub fn thermostat_event(device_id: &str, temp: f64) -> UpdateEvent {
    UpdateEvent {
        device_id: device_id.to_string(),
        kind: DeviceKind::Thermostat,
        display_name: format!("Test {device_id}"),
        location: Some("Test Lab".to_string()),
        timestamp: Utc::now(),
        state: DeviceState::Thermostat(ThermostatState {
            current_temp: temp,
            target_temp: 22.0,
            humidity: 50.0,
        }),
    }
}

pub fn camera_event(device_id: &str, battery: f64) -> UpdateEvent {
    UpdateEvent {
        device_id: device_id.to_string(),
        kind: DeviceKind::Camera,
        display_name: format!("Test {device_id}"),
        location: Some("Test Lab".to_string()),
        timestamp: Utc::now(),
        state: DeviceState::Camera(CameraState {
            motion_detected: false,
            battery_level: battery,
            last_snapshot: None,
        }),
    }
}

/// Parse every line of a history file
pub fn read_history(path: &Path) -> Vec<UpdateRecord> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Timestamps of the records, grouped per device in file order
pub fn timestamps_per_device(records: &[UpdateRecord]) -> HashMap<String, Vec<DateTime<Utc>>> {
    let mut grouped: HashMap<String, Vec<DateTime<Utc>>> = HashMap::new();
    for record in records {
        grouped
            .entry(record.device_id.clone())
            .or_default()
            .push(record.timestamp);
    }
    grouped
}

pub fn is_non_decreasing(timestamps: &[DateTime<Utc>]) -> bool {
    timestamps.windows(2).all(|pair| pair[0] <= pair[1])
}
