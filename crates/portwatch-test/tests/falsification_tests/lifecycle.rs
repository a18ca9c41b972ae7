//! Falsification Tests: Category A - Device & Handle Lifecycle (F001-F010)

use std::sync::Arc;

use portwatch_core::mock::{MockBackend, MockOp};
use portwatch_core::{
    Backend, Device, DeviceFilter, DeviceStatus, ErrorCode, Monitor, MonitorEvent, enumerate,
};
use portwatch_test::HotplugHarness;
use portwatch_test::fixtures::{device_key, hid_device, serial_device};
use proptest::prelude::*;

use super::init_tracing;

fn detached(info: portwatch_core::DeviceInfo) -> (Arc<MockBackend>, Device) {
    let mock = Arc::new(MockBackend::new());
    mock.attach(info);
    let backend: Arc<dyn Backend> = mock.clone();
    let device = enumerate(&backend, &DeviceFilter::any()).unwrap().remove(0);
    (mock, device)
}

// =============================================================================
// F001-F003: Reference counting
// =============================================================================

proptest! {
    /// F001: N references then N releases return the count to where it started
    ///
    /// # Falsification Attempt
    /// Clone a record N times, drop every clone; the record must still be
    /// alive with count 1, and each intermediate count must be exact.
    #[test]
    fn f001_ref_unref_balances(n in 0usize..64) {
        let (_mock, device) = detached(serial_device(1));
        let mut refs = Vec::with_capacity(n);
        for i in 0..n {
            refs.push(device.clone());
            prop_assert_eq!(device.ref_count(), i + 2, "F001 FALSIFIED: count drifted");
        }
        while let Some(r) = refs.pop() {
            drop(r);
            prop_assert_eq!(device.ref_count(), refs.len() + 1, "F001 FALSIFIED: count drifted");
        }
        prop_assert_eq!(device.ref_count(), 1);
        prop_assert!(device.is_online(), "F001 FALSIFIED: record changed while referenced");
    }
}

/// F002: A handle keeps its device alive after every other reference is gone
#[test]
fn f002_handle_outlives_device_references() {
    init_tracing();
    let (_mock, device) = detached(serial_device(2));
    let handle = device.open().unwrap();
    assert_eq!(device.ref_count(), 2);
    drop(device);

    assert_eq!(
        handle.device().ref_count(),
        1,
        "F002 FALSIFIED: handle does not own a device reference"
    );
    assert_eq!(handle.device().path(), "/dev/ttyACM2");
}

/// F003: Monitor destruction does not destroy records still referenced
#[test]
fn f003_records_survive_monitor_drop() {
    init_tracing();
    let harness = HotplugHarness::builder()
        .with_device(serial_device(3))
        .build()
        .unwrap();
    let device = harness.monitor().devices().next().unwrap().clone();
    let monitor_id = harness.monitor().id();
    assert_eq!(device.monitor_id(), Some(monitor_id));

    drop(harness);
    assert_eq!(device.ref_count(), 1, "F003 FALSIFIED: record freed or leaked");
    assert_eq!(device.monitor_id(), None, "F003 FALSIFIED: dangling monitor reference");
    assert_eq!(
        device.status(),
        DeviceStatus::Online,
        "F003 FALSIFIED: monitor drop marked device disconnected"
    );
}

// =============================================================================
// F004-F006: Status transitions
// =============================================================================

/// F004: DISCONNECTED never becomes ONLINE for the same record
///
/// # Falsification Attempt
/// Unplug and replug the same physical device repeatedly; every earlier record
/// must stay disconnected and each replug must produce a distinct record.
#[test]
fn f004_disconnected_is_terminal() {
    init_tracing();
    let mut harness = HotplugHarness::new().unwrap();
    let mut history: Vec<Device> = Vec::new();

    for _ in 0..5 {
        harness.plug(serial_device(4));
        let events = harness.next_events(1_000).unwrap();
        let [MonitorEvent::Added(device)] = events.as_slice() else {
            panic!("F004 FALSIFIED: expected one Added, got {events:?}");
        };
        for old in &history {
            assert!(!old.same_record(device), "F004 FALSIFIED: record reused after removal");
        }
        history.push(device.clone());

        harness.unplug(&device_key(4));
        harness.next_events(1_000).unwrap();
    }

    for old in &history {
        assert_eq!(
            old.status(),
            DeviceStatus::Disconnected,
            "F004 FALSIFIED: removed record came back online"
        );
    }
}

/// F005: Closing a handle leaves the device status alone
#[test]
fn f005_close_does_not_disconnect() {
    init_tracing();
    let (_mock, device) = detached(hid_device(5, 0));
    device.open().unwrap().close();
    assert!(device.is_online(), "F005 FALSIFIED: close marked device disconnected");
    assert_eq!(device.ref_count(), 1);
}

/// F006: Opening a disconnected record fails NOT_FOUND without touching the backend
#[test]
fn f006_open_disconnected_is_not_found() {
    init_tracing();
    let mut harness = HotplugHarness::builder()
        .with_device(serial_device(6))
        .build()
        .unwrap();
    let device = harness.monitor().devices().next().unwrap().clone();
    harness.unplug(&device_key(6));
    harness.next_events(1_000).unwrap();

    let opens = harness.backend().calls(MockOp::Open);
    let err = device.open().unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound, "F006 FALSIFIED: wrong code {err}");
    assert_eq!(
        harness.backend().calls(MockOp::Open),
        opens,
        "F006 FALSIFIED: backend called for a disconnected record"
    );
}

// =============================================================================
// F007-F010: Handles
// =============================================================================

/// F007: A backend open failure leaves the reference count unchanged
#[test]
fn f007_failed_open_leaks_nothing() {
    init_tracing();
    let (mock, device) = detached(serial_device(7));
    mock.fail_next(MockOp::Open, ErrorCode::Access);
    let err = device.open().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Access);
    assert_eq!(device.ref_count(), 1, "F007 FALSIFIED: failed open kept a reference");
}

/// F008: Each open handle has its own waitable
#[test]
fn f008_handles_have_distinct_descriptors() {
    init_tracing();
    let (_mock, device) = detached(serial_device(8));
    let a = device.open().unwrap();
    let b = device.open().unwrap();
    assert!(a.descriptor().is_valid());
    assert_ne!(a.descriptor(), b.descriptor(), "F008 FALSIFIED: handles share a waitable");
    assert_eq!(device.ref_count(), 3);
}

/// F009: One-shot enumeration produces detached records
#[test]
fn f009_enumerate_is_detached() {
    init_tracing();
    let (_mock, device) = detached(serial_device(9));
    assert_eq!(device.monitor_id(), None, "F009 FALSIFIED: enumeration bound a monitor");
    assert!(device.is_online());
}

/// F010: A device removed while a handle is open stays readable through the handle
#[test]
fn f010_handle_sees_removal() {
    init_tracing();
    let mock = Arc::new(MockBackend::new());
    mock.attach(serial_device(10));
    let mut monitor = Monitor::new(mock.clone(), DeviceFilter::any()).unwrap();
    let handle = monitor.devices().next().unwrap().open().unwrap();

    mock.unplug(&device_key(10));
    let events = monitor.refresh().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        handle.device().status(),
        DeviceStatus::Disconnected,
        "F010 FALSIFIED: handle's device still online after removal"
    );
    assert!(events[0].device().same_record(handle.device()));
}
