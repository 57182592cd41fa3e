//! Persistence worker against real and in-memory stores

use std::time::Duration;

use smart_home_sim::{
    Simulation,
    actors::storage::StorageHandle,
    bus::{OverflowPolicy, UpdateBus},
    config::RetryConfig,
    devices::{DeviceKind, DeviceState},
    storage::{jsonl::JsonLinesBackend, memory::MemoryBackend},
};
use tokio_util::sync::CancellationToken;

use crate::helpers::{fast_config, read_history, thermostat_event};

fn quick_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        initial_backoff_ms: 1,
    }
}

#[tokio::test]
async fn test_history_file_keeps_emission_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("history.log");

    let mut builder = UpdateBus::builder();
    let updates = builder.subscribe("storage", 64, OverflowPolicy::Block);
    let bus = builder.build();

    let backend = JsonLinesBackend::open(&path).await.unwrap();
    let (_handle, task) = StorageHandle::spawn(
        updates,
        Box::new(backend),
        quick_retry(),
        CancellationToken::new(),
    );

    for i in 0..25 {
        bus.publish(thermostat_event("t1", 15.0 + i as f64)).await.unwrap();
    }
    drop(bus);

    let stats = task.await.unwrap();
    assert_eq!(stats.written, 25);

    let temps: Vec<f64> = read_history(&path)
        .into_iter()
        .map(|record| {
            assert_eq!(record.device_id, "t1");
            assert_eq!(record.kind, DeviceKind::Thermostat);
            match record.state {
                DeviceState::Thermostat(state) => state.current_temp,
                other => panic!("unexpected state {other:?}"),
            }
        })
        .collect();
    assert_eq!(temps, (0..25).map(|i| 15.0 + i as f64).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_history_lines_are_flat_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.log");

    let mut builder = UpdateBus::builder();
    let updates = builder.subscribe("storage", 8, OverflowPolicy::Block);
    let bus = builder.build();

    let backend = JsonLinesBackend::open(&path).await.unwrap();
    let (_handle, task) = StorageHandle::spawn(
        updates,
        Box::new(backend),
        quick_retry(),
        CancellationToken::new(),
    );

    bus.publish(thermostat_event("t1", 24.5)).await.unwrap();
    drop(bus);
    task.await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let line: serde_json::Value = serde_json::from_str(content.trim_end()).unwrap();

    assert_eq!(line["device_id"], "t1");
    assert_eq!(line["kind"], "THERMOSTAT");
    assert_eq!(line["current_temp"], 24.5);
    assert_eq!(line["humidity"], 50.0);
    assert!(line["timestamp"].as_str().unwrap().contains('T'));
}

#[tokio::test]
async fn test_successive_runs_append_to_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.log");

    let mut total = 0;
    for _ in 0..2 {
        let config = fast_config(&[("b1", DeviceKind::Bulb)], 5);
        let backend = JsonLinesBackend::open(&path).await.unwrap();
        let report = Simulation::new(config)
            .with_backend(backend)
            .run()
            .await
            .unwrap();
        total += report.storage.written;
    }

    assert_eq!(total, 10);
    assert_eq!(read_history(&path).len(), 10);
}

#[tokio::test]
async fn test_cancellation_drains_queued_records() {
    let mut builder = UpdateBus::builder();
    let updates = builder.subscribe("storage", 16, OverflowPolicy::Block);
    let bus = builder.build();

    let backend = MemoryBackend::new().with_latency(Duration::from_millis(25));
    let cancel = CancellationToken::new();
    let (_handle, task) = StorageHandle::spawn(
        updates,
        Box::new(backend.clone()),
        quick_retry(),
        cancel.clone(),
    );

    for i in 0..5 {
        bus.publish(thermostat_event("t1", 20.0 + i as f64)).await.unwrap();
    }

    // the worker is still busy with the first record
    assert!(backend.len() < 5);
    cancel.cancel();
    drop(bus);

    let stats = task.await.unwrap();
    assert_eq!(stats.written, 5);
    assert_eq!(backend.len(), 5);
    assert!(backend.is_closed());
}

#[tokio::test]
async fn test_storage_failures_do_not_affect_other_consumers() {
    let mut config = fast_config(&[("t1", DeviceKind::Thermostat), ("b1", DeviceKind::Bulb)], 30);
    config.storage.retry = quick_retry();

    // two attempts per record: the first three records are lost, the fourth succeeds on retry
    let backend = MemoryBackend::new();
    backend.fail_next(7);

    let report = Simulation::new(config)
        .with_backend(backend.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.storage.failed, 3);
    assert_eq!(report.storage.retries, 4);
    assert_eq!(report.storage.written, 27);
    assert_eq!(backend.len(), 27);

    assert_eq!(report.summary.total_updates, 30);
    assert_eq!(report.alerts.evaluated, 30);
}
