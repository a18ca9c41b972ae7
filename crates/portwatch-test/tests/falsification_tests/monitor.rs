//! Falsification Tests: Category C - Monitor (F026-F035)

use std::sync::Arc;

use portwatch_core::mock::{MockBackend, MockOp};
use portwatch_core::{DeviceFilter, DeviceStatus, DeviceType, ErrorCode, Monitor, MonitorEvent};
use portwatch_test::fixtures::{FIXTURE_VID, device_key, hid_device, serial_device};
use portwatch_test::{FaultPlan, HotplugHarness};

use super::init_tracing;

/// F026: Initial enumeration populates the list and honours the filter
#[test]
fn f026_initial_enumeration_filtered() {
    init_tracing();
    let harness = HotplugHarness::builder()
        .with_filter(DeviceFilter::of_type(DeviceType::Serial))
        .with_device(serial_device(1))
        .with_device(hid_device(2, 0))
        .with_device(serial_device(3))
        .build()
        .unwrap();

    let types: Vec<_> = harness.monitor().devices().map(|d| d.device_type()).collect();
    assert_eq!(
        types,
        vec![DeviceType::Serial, DeviceType::Serial],
        "F026 FALSIFIED: filter leaked or devices missing"
    );
}

/// F027: Refresh with nothing pending changes nothing
#[test]
fn f027_idle_refresh_is_empty() {
    init_tracing();
    let mut harness = HotplugHarness::builder()
        .with_device(serial_device(1))
        .build()
        .unwrap();
    assert!(harness.refresh().unwrap().is_empty());
    assert_eq!(harness.monitor().len(), 1);
    assert!(harness.poll(0).unwrap().is_empty(), "F027 FALSIFIED: idle monitor is ready");
}

/// F028: Disappear/reappear is REMOVED followed by a distinct ADDED in one refresh
#[test]
fn f028_flap_in_one_refresh() {
    init_tracing();
    let mut harness = HotplugHarness::builder()
        .with_device(serial_device(2))
        .build()
        .unwrap();
    let original = harness.monitor().devices().next().unwrap().clone();

    harness.unplug(&device_key(2));
    harness.plug(serial_device(2));
    let events = harness.next_events(1_000).unwrap();

    let [MonitorEvent::Removed(gone), MonitorEvent::Added(back)] = events.as_slice() else {
        panic!("F028 FALSIFIED: expected Removed then Added, got {events:?}");
    };
    assert!(gone.same_record(&original));
    assert!(!back.same_record(&original), "F028 FALSIFIED: record reused");
    assert_eq!(original.status(), DeviceStatus::Disconnected);
    assert!(back.is_online());
}

/// F029: A duplicate arrival for a known identity is ignored
#[test]
fn f029_duplicate_add_ignored() {
    init_tracing();
    let mut harness = HotplugHarness::new().unwrap();
    harness.plug(serial_device(3));
    harness.plug(serial_device(3));
    let events = harness.next_events(1_000).unwrap();
    assert_eq!(events.len(), 1, "F029 FALSIFIED: duplicate identity added");
    assert_eq!(harness.monitor().len(), 1);
}

/// F030: A removal hands back the record, disconnected, under the removed key
#[test]
fn f030_removed_event_carries_record() {
    init_tracing();
    let mut harness = HotplugHarness::builder()
        .with_device(serial_device(4))
        .build()
        .unwrap();
    harness.unplug(&device_key(4));
    let events = harness.next_events(1_000).unwrap();

    let [MonitorEvent::Removed(device)] = events.as_slice() else {
        panic!("F030 FALSIFIED: expected one Removed, got {events:?}");
    };
    assert_eq!(device.key(), device_key(4));
    assert_eq!(device.status(), DeviceStatus::Disconnected);
    assert!(harness.monitor().is_empty());
}

/// F031: Removing a key removes every interface of that device
#[test]
fn f031_remove_all_interfaces() {
    init_tracing();
    let mut harness = HotplugHarness::builder()
        .with_device(hid_device(5, 0))
        .with_device(hid_device(5, 1))
        .with_device(hid_device(6, 0))
        .build()
        .unwrap();
    harness.unplug(&device_key(5));
    let events = harness.next_events(1_000).unwrap();

    assert_eq!(events.len(), 2, "F031 FALSIFIED: interface left behind");
    assert!(events.iter().all(|e| matches!(e, MonitorEvent::Removed(_))));
    assert_eq!(harness.monitor().len(), 1);
    assert!(harness.monitor().find(&device_key(6), 0).is_some());
}

/// F032: A refresh failure keeps the last-known-good list and loses nothing
#[test]
fn f032_refresh_failure_keeps_list() {
    init_tracing();
    let mut harness = HotplugHarness::builder()
        .with_device(serial_device(7))
        .build()
        .unwrap();
    harness.plug(serial_device(8));
    harness.inject(&FaultPlan::lost_notifications());

    let err = harness.refresh().unwrap_err();
    assert!(matches!(err, portwatch_test::TestError::Core(ref e) if e.code() == ErrorCode::System));
    assert_eq!(harness.monitor().len(), 1, "F032 FALSIFIED: failed refresh changed list");

    let events = harness.next_events(1_000).unwrap();
    assert_eq!(events.len(), 1, "F032 FALSIFIED: pending notification lost");
    assert_eq!(harness.monitor().len(), 2);
}

/// F033: Subscription or initial enumeration failure is fatal to construction
#[test]
fn f033_construction_failures() {
    init_tracing();
    for op in [MockOp::Subscribe, MockOp::Enumerate] {
        let mock = Arc::new(MockBackend::new());
        mock.fail_next(op, ErrorCode::Access);
        let err = Monitor::new(mock.clone(), DeviceFilter::any()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Access, "F033 FALSIFIED: {op:?} not propagated");
    }
}

/// F034: devices() iterates in stable identity order
#[test]
fn f034_stable_order() {
    init_tracing();
    let mut harness = HotplugHarness::new().unwrap();
    for port in [9u8, 3, 7, 1] {
        harness.plug(serial_device(port));
    }
    harness.next_events(1_000).unwrap();

    let first: Vec<String> = harness.monitor().devices().map(|d| d.key().to_string()).collect();
    let mut sorted = first.clone();
    sorted.sort();
    assert_eq!(first, sorted, "F034 FALSIFIED: order is not by identity");
    let second: Vec<String> = harness.monitor().devices().map(|d| d.key().to_string()).collect();
    assert_eq!(first, second);
}

/// F035: Unmatched arrivals are ignored but still consumed
#[test]
fn f035_unmatched_arrivals_ignored() {
    init_tracing();
    let mut harness = HotplugHarness::builder()
        .with_filter(DeviceFilter::any().with_vid(0x1234))
        .build()
        .unwrap();
    harness.plug(serial_device(2));
    let events = harness.next_events(1_000).unwrap();
    assert!(events.is_empty(), "F035 FALSIFIED: vid {FIXTURE_VID:#06x} passed filter");
    assert!(harness.poll(0).unwrap().is_empty(), "F035 FALSIFIED: notification not drained");
}
