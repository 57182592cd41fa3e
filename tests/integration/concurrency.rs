//! Many devices, slow consumers and cancellation races

use std::time::Duration;

use smart_home_sim::{
    Simulation,
    actors::analytics::AnalyticsHandle,
    actors::device::DeviceHandle,
    bus::{OverflowPolicy, UpdateBus},
    config::TimingConfig,
    devices::{DeviceIdentity, DeviceKind},
    storage::memory::MemoryBackend,
};
use tokio_util::sync::CancellationToken;

use crate::helpers::{fast_config, is_non_decreasing, timestamps_per_device};

fn fleet(size: usize) -> Vec<(String, DeviceKind)> {
    let kinds = [DeviceKind::Bulb, DeviceKind::Thermostat, DeviceKind::Camera];
    (0..size)
        .map(|i| (format!("dev-{i}"), kinds[i % kinds.len()]))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_large_fleet_counts_every_update_once() {
    let devices = fleet(24);
    let roster: Vec<(&str, DeviceKind)> = devices
        .iter()
        .map(|(id, kind)| (id.as_str(), *kind))
        .collect();
    let config = fast_config(&roster, 300);

    let backend = MemoryBackend::new();
    let report = Simulation::new(config)
        .with_backend(backend.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.devices.len(), 24);
    assert_eq!(report.emitted(), 300);
    assert_eq!(report.summary.total_updates, 300);
    assert_eq!(report.storage.written, 300);
    assert_eq!(report.alerts.evaluated, 300);

    let records = backend.records();
    for timestamps in timestamps_per_device(&records).values() {
        assert!(is_non_decreasing(timestamps));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_store_loses_nothing() {
    let mut config = fast_config(
        &[("t1", DeviceKind::Thermostat), ("c1", DeviceKind::Camera)],
        40,
    );
    // a tiny queue forces producers to wait for the store
    config.bus.storage.capacity = 2;

    let backend = MemoryBackend::new().with_latency(Duration::from_millis(3));
    let report = Simulation::new(config)
        .with_backend(backend.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.storage.written, report.emitted());
    assert_eq!(backend.len() as u64, report.emitted());
    assert_eq!(report.summary.total_updates, report.emitted());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_mid_run_leaves_consistent_totals() {
    let devices = fleet(6);
    let roster: Vec<(&str, DeviceKind)> = devices
        .iter()
        .map(|(id, kind)| (id.as_str(), *kind))
        .collect();
    let mut config = fast_config(&roster, 0);
    config.run.max_events = None;

    let backend = MemoryBackend::new().with_latency(Duration::from_millis(1));
    let simulation = Simulation::new(config).with_backend(backend.clone());
    let cancel = simulation.cancel_token();

    let run = tokio::spawn(simulation.run());
    tokio::time::sleep(Duration::from_millis(80)).await;
    cancel.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run should stop after cancellation")
        .unwrap()
        .unwrap();

    assert!(report.emitted() > 0);
    assert_eq!(report.summary.total_updates, report.emitted());
    assert_eq!(report.storage.written, report.emitted());
    assert_eq!(backend.len() as u64, report.emitted());
}

#[tokio::test]
async fn test_lossy_queue_never_stalls_devices() {
    let mut builder = UpdateBus::builder();
    // nobody reads this queue
    let _stalled = builder.subscribe("stalled", 1, OverflowPolicy::DropNewest);
    let analytics_updates = builder.subscribe("analytics", 1024, OverflowPolicy::Block);
    let bus = builder.build();
    let cancel = CancellationToken::new();

    let (_analytics, analytics_task) = AnalyticsHandle::spawn(analytics_updates);

    let mut tasks = vec![];
    let mut handles = vec![];
    for i in 0..3 {
        let identity = DeviceIdentity::new(format!("b{i}"), DeviceKind::Bulb, "Bulb");
        let (handle, task) = DeviceHandle::spawn(
            identity,
            Some(i),
            TimingConfig::fixed_range(1, 2),
            bus.clone(),
            cancel.clone(),
        );
        handles.push(handle);
        tasks.push(task);
    }
    drop(bus);

    tokio::time::sleep(Duration::from_millis(60)).await;
    cancel.cancel();

    let mut emitted = 0;
    for task in tasks {
        emitted += task.await.unwrap().emitted;
    }
    drop(handles);

    // far more updates than the stalled queue could ever hold
    assert!(emitted > 3);
    assert_eq!(analytics_task.await.unwrap().total_updates, emitted);
}
