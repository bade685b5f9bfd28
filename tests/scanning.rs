mod common;

use common::{FakeTransport, found, manager, names, peripheral, wait_for};
use safewalk_ble::{BleEvent, Peripheral, ScanEvent};

#[tokio::test]
async fn scan_error_does_not_stop_discovery() {
    let transport = FakeTransport::new();
    let mut manager = manager(&transport);
    let mut events = manager.subscribe();

    manager.start_scan().await;
    transport.report_named("1", "Beacon-1");
    transport.report(ScanEvent::Error("radio hiccup".to_string()));
    transport.report_named("2", "Beacon-1");
    transport.report_named("3", "Beacon-2");

    wait_for(&mut events, |e| matches!(e, BleEvent::ScanError(_))).await;
    wait_for(&mut events, found("Beacon-2")).await;

    assert_eq!(names(&manager.devices()), vec!["Beacon-1", "Beacon-2"]);
    assert!(manager.is_scanning());

    manager.stop_scan().await;
    assert!(!manager.is_scanning());
}

#[tokio::test]
async fn duplicates_and_unnamed_devices_are_dropped() {
    let transport = FakeTransport::new();
    let mut manager = manager(&transport);
    let mut events = manager.subscribe();

    manager.start_scan().await;
    transport.report_named("1", "A");
    transport.report_named("2", "B");
    transport.report_named("3", "A");
    transport.report_named("4", "");
    transport.report(ScanEvent::Discovered(Peripheral::new("5", "5", None, None)));
    transport.report_named("6", "C");

    wait_for(&mut events, found("C")).await;
    assert_eq!(names(&manager.devices()), vec!["A", "B", "C"]);
    assert_eq!(manager.devices()[0].id, "1");
}

#[tokio::test]
async fn devices_with_the_same_name_collapse_into_the_first() {
    let transport = FakeTransport::new();
    let mut manager = manager(&transport);
    let mut events = manager.subscribe();

    manager.start_scan().await;
    transport.report_named("1", "Beacon");
    transport.report_named("2", "Beacon");
    transport.report_named("3", "Marker");
    wait_for(&mut events, found("Marker")).await;

    let devices = manager.devices();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, "1");
    assert!(manager.find_device("Beacon").is_some_and(|p| p.id == "1"));
}

#[tokio::test]
async fn stop_scan_keeps_the_registry() {
    let transport = FakeTransport::new();
    let mut manager = manager(&transport);
    let mut events = manager.subscribe();

    manager.start_scan().await;
    transport.report_named("1", "Beacon-1");
    wait_for(&mut events, found("Beacon-1")).await;

    manager.stop_scan().await;
    wait_for(&mut events, |e| *e == BleEvent::ScanStopped).await;
    assert!(!manager.is_scanning());
    assert_eq!(names(&manager.devices()), vec!["Beacon-1"]);
}

#[tokio::test]
async fn restarting_a_scan_starts_from_an_empty_registry() {
    let transport = FakeTransport::new();
    let mut manager = manager(&transport);
    let mut events = manager.subscribe();

    manager.start_scan().await;
    transport.report_named("1", "Beacon-1");
    wait_for(&mut events, found("Beacon-1")).await;

    manager.start_scan().await;
    assert!(manager.devices().is_empty());

    transport.report_named("1", "Beacon-1");
    wait_for(&mut events, found("Beacon-1")).await;
    assert_eq!(names(&manager.devices()), vec!["Beacon-1"]);
    assert_eq!(
        transport.calls().iter().filter(|c| *c == "discover").count(),
        2
    );
}

#[tokio::test]
async fn stop_scan_without_a_scan_is_harmless() {
    let transport = FakeTransport::new();
    let mut manager = manager(&transport);
    manager.stop_scan().await;
    assert!(!manager.is_scanning());
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn failing_to_start_discovery_is_reported_not_raised() {
    let transport = FakeTransport::new();
    *transport.fail_scan_start.lock().unwrap() = true;
    let mut manager = manager(&transport);
    let mut events = manager.subscribe();

    manager.start_scan().await;
    match wait_for(&mut events, |e| matches!(e, BleEvent::ScanError(_))).await {
        BleEvent::ScanError(reason) => assert!(reason.contains("adapter powered off")),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(manager.devices().is_empty());
    manager.stop_scan().await;
}

#[tokio::test]
async fn registry_is_not_touched_by_connect_failures() {
    let transport = FakeTransport::new();
    transport.fail_connect.lock().unwrap().insert("1".to_string());
    let mut manager = manager(&transport);
    let mut events = manager.subscribe();

    manager.start_scan().await;
    transport.report_named("1", "Beacon-1");
    wait_for(&mut events, found("Beacon-1")).await;

    assert!(manager.connect(&peripheral("1", "Beacon-1")).await.is_err());
    assert!(manager.is_scanning());
    assert_eq!(names(&manager.devices()), vec!["Beacon-1"]);
}

#[tokio::test]
async fn scan_started_precedes_any_scan_report() {
    let transport = FakeTransport::new();
    *transport.fail_scan_start.lock().unwrap() = true;
    let mut manager = manager(&transport);
    let mut events = manager.subscribe();

    manager.start_scan().await;

    assert_eq!(events.recv().await.unwrap(), BleEvent::ScanStarted);
    wait_for(&mut events, |e| matches!(e, BleEvent::ScanError(_))).await;
    manager.stop_scan().await;
}
