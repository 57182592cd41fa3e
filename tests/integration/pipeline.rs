//! End-to-end tests: devices → bus → alerts, storage and analytics

use std::time::Duration;

use smart_home_sim::{
    AnalyticsSummary, Simulation,
    actors::{alert::AlertHandle, analytics::AnalyticsHandle, storage::StorageHandle},
    alerts::{AlertKind, Severity},
    bus::{OverflowPolicy, UpdateBus},
    config::{BackendConfig, RetryConfig},
    devices::DeviceKind,
    storage::{jsonl::JsonLinesBackend, memory::MemoryBackend},
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::helpers::{
    camera_event, fast_config, is_non_decreasing, read_history, thermostat_event,
    timestamps_per_device,
};

#[tokio::test]
async fn test_two_devices_persist_everything_they_emit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.log");

    let mut config = fast_config(
        &[("t1", DeviceKind::Thermostat), ("c1", DeviceKind::Camera)],
        40,
    );
    config.storage.backend = BackendConfig::Jsonl { path: path.clone() };

    let report = Simulation::new(config).run().await.unwrap();

    assert_eq!(report.emitted(), 40);
    assert_eq!(report.summary.total_updates, report.emitted());
    assert_eq!(report.storage.written, report.emitted());
    assert_eq!(report.storage.failed, 0);

    let records = read_history(&path);
    assert_eq!(records.len() as u64, report.emitted());

    // every device's records appear in emission order
    let grouped = timestamps_per_device(&records);
    for device in &report.devices {
        let timestamps = grouped
            .get(&device.device_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        assert_eq!(timestamps.len() as u64, device.emitted);
        assert!(is_non_decreasing(timestamps));
    }
}

#[tokio::test]
async fn test_consumers_agree_on_hand_fed_updates() {
    let mut builder = UpdateBus::builder();
    let alert_updates = builder.subscribe("alerts", 16, OverflowPolicy::Block);
    let storage_updates = builder.subscribe("storage", 16, OverflowPolicy::Block);
    let analytics_updates = builder.subscribe("analytics", 16, OverflowPolicy::Block);
    let bus = builder.build();

    let (alert_tx, mut alert_rx) = broadcast::channel(16);
    let backend = MemoryBackend::new();

    let (_alerts, alert_task) = AlertHandle::spawn(alert_updates, alert_tx, vec![]);
    let (_storage, storage_task) = StorageHandle::spawn(
        storage_updates,
        Box::new(backend.clone()),
        RetryConfig::default(),
        CancellationToken::new(),
    );
    let (_analytics, analytics_task) = AnalyticsHandle::spawn(analytics_updates);

    for temp in [28.0, 31.0, 29.0] {
        bus.publish(thermostat_event("t1", temp)).await.unwrap();
    }
    for battery in [15.0, 9.0] {
        bus.publish(camera_event("c1", battery)).await.unwrap();
    }
    drop(bus);

    let alert_stats = alert_task.await.unwrap();
    let storage_stats = storage_task.await.unwrap();
    let summary = analytics_task.await.unwrap().summary();

    assert_eq!(alert_stats.evaluated, 5);
    assert_eq!(alert_stats.raised, 2);
    assert_eq!(storage_stats.written, 5);
    assert_eq!(backend.len(), 5);

    let high = alert_rx.recv().await.unwrap();
    assert_eq!(high.kind, AlertKind::HighTemperature);
    assert_eq!(high.severity, Severity::Alert);
    assert!(high.message.contains("31.0"));

    let low = alert_rx.recv().await.unwrap();
    assert_eq!(low.kind, AlertKind::LowBattery);
    assert_eq!(low.severity, Severity::Warning);
    assert!(low.message.contains("9.0%"));

    assert_eq!(summary.total_updates, 5);
    assert!((summary.average_temp - 29.333).abs() < 0.001);
    assert_eq!(summary.average_battery, 12.0);
    assert_eq!(summary.critical_event_count, 2);
}

#[tokio::test]
async fn test_summary_is_stable_after_run() {
    let config = fast_config(&[("b1", DeviceKind::Bulb), ("t1", DeviceKind::Thermostat)], 20);

    let report = Simulation::new(config)
        .with_backend(MemoryBackend::new())
        .run()
        .await
        .unwrap();

    let json = serde_json::to_value(report.summary).unwrap();
    let again: AnalyticsSummary = serde_json::from_value(json).unwrap();
    assert_eq!(again, report.summary);
    assert!(report.summary.average_temp >= -20.0 && report.summary.average_temp <= 50.0);
}

#[tokio::test]
async fn test_alert_stream_reaches_subscribers() {
    let mut config = fast_config(&[("c1", DeviceKind::Camera)], 60);
    config.alerts.auto_remediate = false;

    let simulation = Simulation::new(config).with_backend(MemoryBackend::new());
    let mut alerts = simulation.subscribe_alerts();

    let report = simulation.run().await.unwrap();

    let mut received = 0;
    while let Ok(alert) = alerts.try_recv() {
        assert_eq!(alert.device_id, "c1");
        assert_ne!(alert.kind, AlertKind::HighTemperature);
        received += 1;
    }

    assert_eq!(received, report.alerts.raised);
    // one update can raise motion and low battery at once
    assert!(report.alerts.raised >= report.summary.critical_event_count);
}

#[tokio::test]
async fn test_duration_limit_stops_run() {
    let mut config = fast_config(&[("b1", DeviceKind::Bulb)], 0);
    config.run.max_events = None;
    config.run.duration_secs = Some(1);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.log");
    let backend = JsonLinesBackend::open(&path).await.unwrap();

    let started = std::time::Instant::now();
    let report = Simulation::new(config)
        .with_backend(backend)
        .run()
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(report.emitted() > 0);
    assert_eq!(report.storage.written, report.emitted());
    assert_eq!(read_history(&path).len() as u64, report.emitted());
}
