use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::bus::OverflowPolicy;
use crate::devices::{DeviceIdentity, DeviceKind};

/// Full configuration of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Device roster
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceConfig>,

    #[serde(default)]
    pub run: RunLimit,

    /// Seed for reproducible runs (random if absent)
    pub seed: Option<u64>,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub alerts: AlertConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            devices: default_devices(),
            run: RunLimit::default(),
            seed: None,
            timing: TimingConfig::default(),
            bus: BusConfig::default(),
            storage: StorageConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    pub kind: DeviceKind,
    pub display: Option<String>,
    pub location: Option<String>,
}

impl DeviceConfig {
    pub fn identity(&self) -> DeviceIdentity {
        let display_name = self.display.clone().unwrap_or_else(|| self.id.clone());
        DeviceIdentity {
            id: self.id.clone(),
            kind: self.kind,
            display_name,
            location: self.location.clone(),
        }
    }
}

/// When a run stops; whichever limit is hit first wins
///
/// Without any limit the run lasts until it is cancelled from outside.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunLimit {
    pub duration_secs: Option<u64>,
    pub max_events: Option<u64>,
}

impl Default for RunLimit {
    fn default() -> Self {
        Self {
            duration_secs: Some(default_duration_secs()),
            max_events: None,
        }
    }
}

impl RunLimit {
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }
}

/// Simulated network timings (milliseconds)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_connect_min_ms")]
    pub connect_min_ms: u64,
    #[serde(default = "default_connect_max_ms")]
    pub connect_max_ms: u64,
    #[serde(default = "default_interval_min_ms")]
    pub interval_min_ms: u64,
    #[serde(default = "default_interval_max_ms")]
    pub interval_max_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_min_ms: default_connect_min_ms(),
            connect_max_ms: default_connect_max_ms(),
            interval_min_ms: default_interval_min_ms(),
            interval_max_ms: default_interval_max_ms(),
        }
    }
}

impl TimingConfig {
    /// Same bounds for connecting and updating, handy in tests
    pub fn fixed_range(min_ms: u64, max_ms: u64) -> Self {
        Self {
            connect_min_ms: min_ms,
            connect_max_ms: max_ms,
            interval_min_ms: min_ms,
            interval_max_ms: max_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueConfig {
    pub capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl QueueConfig {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            overflow: OverflowPolicy::Block,
        }
    }
}

/// Queue of every bus consumer
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_alert_queue")]
    pub alerts: QueueConfig,
    #[serde(default = "default_storage_queue")]
    pub storage: QueueConfig,
    #[serde(default = "default_analytics_queue")]
    pub analytics: QueueConfig,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            alerts: default_alert_queue(),
            storage: default_storage_queue(),
            analytics: default_analytics_queue(),
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendConfig {
    /// JSON-lines history file
    Jsonl {
        #[serde(default = "default_history_path")]
        path: PathBuf,
    },

    /// Keep records in memory only
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(flatten)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Jsonl {
                path: default_history_path(),
            },
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy for failed appends
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per record, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based), doubling each time
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Cool a thermostat down after a high temperature alert
    #[serde(default = "default_auto_remediate")]
    pub auto_remediate: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            auto_remediate: default_auto_remediate(),
        }
    }
}

impl SimulationConfig {
    /// Reject configurations the simulation cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.devices.is_empty() {
            bail!("device roster is empty");
        }

        let mut ids = HashSet::new();
        for device in &self.devices {
            if !ids.insert(device.id.as_str()) {
                bail!("duplicate device id '{}'", device.id);
            }
        }

        let timing = &self.timing;
        if timing.connect_min_ms > timing.connect_max_ms {
            bail!(
                "connect delay range is empty ({}ms > {}ms)",
                timing.connect_min_ms,
                timing.connect_max_ms
            );
        }
        if timing.interval_min_ms > timing.interval_max_ms {
            bail!(
                "update interval range is empty ({}ms > {}ms)",
                timing.interval_min_ms,
                timing.interval_max_ms
            );
        }

        for (name, queue) in [
            ("alerts", self.bus.alerts),
            ("storage", self.bus.storage),
            ("analytics", self.bus.analytics),
        ] {
            if queue.capacity == 0 {
                bail!("{name} queue capacity must be at least 1");
            }
        }

        if self.storage.retry.max_attempts == 0 {
            bail!("storage retry needs at least one attempt");
        }

        Ok(())
    }

    pub fn identities(&self) -> Vec<DeviceIdentity> {
        self.devices.iter().map(DeviceConfig::identity).collect()
    }
}

/// The three-device home: a bulb, a thermostat and a camera
fn default_devices() -> Vec<DeviceConfig> {
    vec![
        DeviceConfig {
            id: "b1".to_string(),
            kind: DeviceKind::Bulb,
            display: Some("Smart Bulb".to_string()),
            location: Some("Living Room".to_string()),
        },
        DeviceConfig {
            id: "t1".to_string(),
            kind: DeviceKind::Thermostat,
            display: Some("Smart Thermostat".to_string()),
            location: Some("Main Room".to_string()),
        },
        DeviceConfig {
            id: "c1".to_string(),
            kind: DeviceKind::Camera,
            display: Some("Smart Camera".to_string()),
            location: Some("Entrance".to_string()),
        },
    ]
}

fn default_duration_secs() -> u64 {
    30
}

fn default_connect_min_ms() -> u64 {
    500
}

fn default_connect_max_ms() -> u64 {
    2000
}

fn default_interval_min_ms() -> u64 {
    500
}

fn default_interval_max_ms() -> u64 {
    2500
}

fn default_alert_queue() -> QueueConfig {
    QueueConfig::new(256)
}

fn default_storage_queue() -> QueueConfig {
    QueueConfig::new(10_000)
}

fn default_analytics_queue() -> QueueConfig {
    QueueConfig::new(1024)
}

fn default_history_path() -> PathBuf {
    PathBuf::from("./history.log")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_auto_remediate() -> bool {
    true
}

pub fn read_config_file(path: &str) -> anyhow::Result<SimulationConfig> {
    let file_content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    serde_json::from_str::<SimulationConfig>(&file_content)
        .context("invalid configuration file provided")
        .inspect(|config| trace!("loaded config: {config:?}"))
}
