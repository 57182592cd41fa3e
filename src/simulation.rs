//! Orchestration of a simulation run
//!
//! ## Lifecycle
//!
//! 1. Open the store and register one bus queue per consumer
//! 2. Spawn the consumers, then one actor per device
//! 3. Stop when the duration elapses, the event limit is reached or the
//!    cancellation token is triggered from outside
//! 4. Wait for every device to exit; this drops the last publisher and closes
//!    the consumer queues
//! 5. Collect the consumers' final results once they have drained
//!
//! The summary is therefore only computed after every device loop has exited.

use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::actors::alert::AlertHandle;
use crate::actors::analytics::AnalyticsHandle;
use crate::actors::device::{DeviceHandle, DeviceReport};
use crate::actors::messages::{AlertStats, StorageStats};
use crate::actors::storage::StorageHandle;
use crate::alerts::AlertRecord;
use crate::analytics::AnalyticsSummary;
use crate::bus::UpdateBus;
use crate::config::{BackendConfig, SimulationConfig};
use crate::devices::DeviceKind;
use crate::storage::StorageBackend;
use crate::storage::jsonl::JsonLinesBackend;
use crate::storage::memory::MemoryBackend;

const ALERT_STREAM_CAPACITY: usize = 256;

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: AnalyticsSummary,

    /// One entry per device, in roster order
    pub devices: Vec<DeviceReport>,

    pub storage: StorageStats,

    pub alerts: AlertStats,
}

impl RunReport {
    /// Updates accepted by the bus across all devices
    pub fn emitted(&self) -> u64 {
        self.devices.iter().map(|device| device.emitted).sum()
    }
}

pub struct Simulation {
    config: SimulationConfig,
    cancel: CancellationToken,
    alert_tx: broadcast::Sender<AlertRecord>,
    backend: Option<Box<dyn StorageBackend>>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        let (alert_tx, _) = broadcast::channel(ALERT_STREAM_CAPACITY);

        Self {
            config,
            cancel: CancellationToken::new(),
            alert_tx,
            backend: None,
        }
    }

    /// Use `backend` instead of the one from the configuration
    pub fn with_backend(mut self, backend: impl StorageBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Token stopping the run when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Receiver for every alert raised during the run
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertRecord> {
        self.alert_tx.subscribe()
    }

    /// Run the simulation to completion
    #[instrument(skip(self))]
    pub async fn run(mut self) -> anyhow::Result<RunReport> {
        self.config.validate()?;

        let backend = match self.backend.take() {
            Some(backend) => backend,
            None => open_backend(&self.config.storage.backend).await?,
        };

        let mut builder = UpdateBus::builder();
        if let Some(max) = self.config.run.max_events {
            builder = builder.event_limit(max, self.cancel.clone());
        }

        let queues = &self.config.bus;
        let alert_updates =
            builder.subscribe("alerts", queues.alerts.capacity, queues.alerts.overflow);
        let storage_updates =
            builder.subscribe("storage", queues.storage.capacity, queues.storage.overflow);
        let analytics_updates =
            builder.subscribe("analytics", queues.analytics.capacity, queues.analytics.overflow);
        let bus = builder.build();

        let (_storage, storage_task) = StorageHandle::spawn(
            storage_updates,
            backend,
            self.config.storage.retry,
            self.cancel.clone(),
        );
        let (_analytics, analytics_task) = AnalyticsHandle::spawn(analytics_updates);

        info!(
            "starting simulation with {} devices",
            self.config.devices.len()
        );

        let mut devices = vec![];
        let mut device_tasks = vec![];
        for identity in self.config.identities() {
            let (handle, task) = DeviceHandle::spawn(
                identity,
                self.config.seed,
                self.config.timing,
                bus.clone(),
                self.cancel.clone(),
            );
            devices.push(handle);
            device_tasks.push(task);
        }

        let remediation = if self.config.alerts.auto_remediate {
            devices
                .iter()
                .filter(|device| device.kind == DeviceKind::Thermostat)
                .cloned()
                .collect()
        } else {
            vec![]
        };
        let (_alerts, alert_task) =
            AlertHandle::spawn(alert_updates, self.alert_tx.clone(), remediation);

        // devices hold the only publishers from here on
        drop(bus);

        let timer = self
            .config
            .run
            .duration()
            .map(|duration| arm_timer(duration, self.cancel.clone()));

        let mut reports = vec![];
        for result in join_all(device_tasks).await {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => error!("device task failed: {e}"),
            }
        }
        debug!("all devices stopped");
        // a device exits once its command channel closes, so handles live until here
        drop(devices);

        if let Some(timer) = timer {
            timer.abort();
        }
        // a run that ended on its own still counts as stopped
        self.cancel.cancel();

        let storage = storage_task.await.context("storage actor failed")?;
        let accumulator = analytics_task.await.context("analytics actor failed")?;
        let alerts = alert_task.await.context("alert actor failed")?;

        let report = RunReport {
            summary: accumulator.summary(),
            devices: reports,
            storage,
            alerts,
        };

        info!(
            "simulation finished: {} updates, {} persisted, {} alerts",
            report.summary.total_updates, report.storage.written, report.alerts.raised
        );

        Ok(report)
    }
}

fn arm_timer(duration: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {
                debug!("run duration of {duration:?} elapsed");
                cancel.cancel();
            }
        }
    })
}

async fn open_backend(config: &BackendConfig) -> anyhow::Result<Box<dyn StorageBackend>> {
    match config {
        BackendConfig::Jsonl { path } => {
            let backend = JsonLinesBackend::open(path)
                .await
                .with_context(|| format!("failed to open history file {}", path.display()))?;
            Ok(Box::new(backend))
        }
        BackendConfig::Memory => Ok(Box::new(MemoryBackend::new())),
    }
}
