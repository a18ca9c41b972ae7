//! Falsification Tests: Category D - Serial & HID I/O (F036-F047)

use std::sync::Arc;
use std::time::{Duration, Instant};

use portwatch_core::mock::{MockBackend, MockOp};
use portwatch_core::{
    Backend, BaudRate, DeviceFilter, DeviceInfo, ErrorCode, Handle, SerialFlags, enumerate, hid,
    serial,
};
use portwatch_test::fixtures::{RAW_HID_DESCRIPTOR, hid_device, serial_device};
use proptest::prelude::*;

use super::init_tracing;

fn open(info: DeviceInfo) -> (Arc<MockBackend>, Handle) {
    let mock = Arc::new(MockBackend::new());
    mock.attach(info);
    let backend: Arc<dyn Backend> = mock.clone();
    let device = enumerate(&backend, &DeviceFilter::any()).unwrap().remove(0);
    let handle = device.open().unwrap();
    (mock, handle)
}

const SUPPORTED: [u32; 15] = [
    110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600, 115_200,
];

// =============================================================================
// F036-F040: set_attributes validation
// =============================================================================

/// F036: Two character-size flags fail INVALID with zero backend calls
#[test]
fn f036_conflicting_sizes_never_reach_backend() {
    init_tracing();
    let (mock, mut handle) = open(serial_device(1));
    let pairs = [
        SerialFlags::CSIZE_5BITS | SerialFlags::CSIZE_6BITS,
        SerialFlags::CSIZE_6BITS | SerialFlags::CSIZE_7BITS,
        SerialFlags::CSIZE_5BITS | SerialFlags::CSIZE_7BITS,
    ];
    for flags in pairs {
        let err = serial::set_attributes(&mut handle, 9600, flags).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid, "F036 FALSIFIED: {flags:?} accepted");
    }
    assert_eq!(
        mock.calls(MockOp::ConfigureSerial),
        0,
        "F036 FALSIFIED: backend configured despite invalid flags"
    );
}

proptest! {
    /// F037: Any rate outside the supported list is INVALID before the backend
    #[test]
    fn f037_unknown_rates_rejected(rate in any::<u32>()) {
        prop_assume!(!SUPPORTED.contains(&rate));
        let (mock, mut handle) = open(serial_device(2));
        let err = serial::set_attributes(&mut handle, rate, SerialFlags::empty()).unwrap_err();
        prop_assert_eq!(err.code(), ErrorCode::Invalid);
        prop_assert_eq!(mock.calls(MockOp::ConfigureSerial), 0);
    }

    /// F038: Unknown flag bits are INVALID before the backend
    #[test]
    fn f038_unknown_bits_rejected(bits in 0x200u32..) {
        let (mock, mut handle) = open(serial_device(3));
        let flags = SerialFlags::from_bits_retain(bits);
        let err = serial::set_attributes(&mut handle, 9600, flags).unwrap_err();
        prop_assert_eq!(err.code(), ErrorCode::Invalid);
        prop_assert_eq!(mock.calls(MockOp::ConfigureSerial), 0);
    }
}

/// F039: Every supported rate reaches the backend unchanged
#[test]
fn f039_supported_rates_applied() {
    init_tracing();
    let (mock, mut handle) = open(serial_device(4));
    for rate in SUPPORTED {
        serial::set_attributes(&mut handle, rate, SerialFlags::PARITY_ODD).unwrap();
        let applied = mock.serial_settings("/dev/ttyACM4").unwrap();
        assert_eq!(applied.baud, BaudRate::try_from(rate).unwrap());
        assert_eq!(applied.to_string(), format!("{rate} 8O1"));
    }
    assert_eq!(mock.calls(MockOp::ConfigureSerial), SUPPORTED.len());
}

/// F040: Serial operations on a HID handle are INVALID, and vice versa
#[test]
fn f040_family_mismatch() {
    init_tracing();
    let (mock, mut hid_handle) = open(hid_device(5, 0));
    let mut buf = [0u8; 8];
    let err = serial::set_attributes(&mut hid_handle, 9600, SerialFlags::empty()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Invalid);
    assert_eq!(serial::write(&mut hid_handle, b"x").unwrap_err().code(), ErrorCode::Invalid);
    assert_eq!(mock.calls(MockOp::Write), 0, "F040 FALSIFIED: backend reached");

    let (_mock, mut serial_handle) = open(serial_device(5));
    let err = hid::read(&mut serial_handle, &mut buf, 0).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Invalid, "F040 FALSIFIED: HID read on serial");
}

// =============================================================================
// F041-F043: Serial transfers
// =============================================================================

/// F041: A serial read with nothing pending returns 0 after the timeout
#[test]
fn f041_read_timeout() {
    init_tracing();
    let (_mock, mut handle) = open(serial_device(6));
    let mut buf = [0u8; 32];
    let start = Instant::now();
    assert_eq!(serial::read(&mut handle, &mut buf, 40).unwrap(), 0);
    assert!(start.elapsed() >= Duration::from_millis(40), "F041 FALSIFIED: returned early");
}

/// F042: Written bytes reach the device; injected bytes reach the reader
#[test]
fn f042_transfer_round_trip() {
    init_tracing();
    let (mock, mut handle) = open(serial_device(7));
    assert_eq!(serial::write(&mut handle, b"AT+GMR\r\n").unwrap(), 8);
    assert_eq!(mock.written("/dev/ttyACM7"), b"AT+GMR\r\n");

    let mut buf = [0u8; 32];
    assert_eq!(serial::read(&mut handle, &mut buf, 500).unwrap(), 8);

    mock.inject("/dev/ttyACM7", b"OK\r\n");
    assert_eq!(serial::read(&mut handle, &mut buf, 500).unwrap(), 4);
    assert_eq!(&buf[..4], b"OK\r\n");
}

/// F043: Transfer failures propagate with their code
#[test]
fn f043_transfer_failures_propagate() {
    init_tracing();
    let (mock, mut handle) = open(serial_device(8));
    portwatch_test::FaultPlan::unplugged_mid_transfer().apply(&mock);
    let mut buf = [0u8; 4];
    assert_eq!(serial::read(&mut handle, &mut buf, 0).unwrap_err().code(), ErrorCode::Io);
    assert_eq!(serial::write(&mut handle, b"x").unwrap_err().code(), ErrorCode::Io);
}

// =============================================================================
// F044-F047: HID
// =============================================================================

/// F044: Output reports shorter than id + payload transfer nothing
#[test]
fn f044_short_hid_reports() {
    init_tracing();
    let (mock, mut handle) = open(hid_device(9, 0));
    assert_eq!(hid::write(&mut handle, &[]).unwrap(), 0);
    assert_eq!(hid::write(&mut handle, &[0x00]).unwrap(), 0);
    assert_eq!(hid::send_feature_report(&mut handle, &[0x01]).unwrap(), 0);
    assert_eq!(mock.calls(MockOp::Write), 0, "F044 FALSIFIED: short report written");
    assert_eq!(mock.calls(MockOp::FeatureReport), 0);
    assert_eq!(hid::write(&mut handle, &[0x00, 0x42]).unwrap(), 2);
}

/// F045: The report descriptor yields the top-level usage page and usage
#[test]
fn f045_parse_descriptor() {
    init_tracing();
    let (mock, mut handle) = open(hid_device(10, 1));
    mock.set_report_descriptor(&handle.device().path().to_string(), RAW_HID_DESCRIPTOR);
    let desc = hid::parse_descriptor(&mut handle).unwrap();
    assert_eq!((desc.usage_page, desc.usage), (0xFFAB, 0x0200), "F045 FALSIFIED");
}

/// F046: Feature reports round-trip by report id
#[test]
fn f046_feature_reports() {
    init_tracing();
    let (_mock, mut handle) = open(hid_device(11, 0));
    assert_eq!(hid::send_feature_report(&mut handle, &[0x05, 1, 2, 3]).unwrap(), 4);

    let mut buf = [0u8; 16];
    let n = hid::get_feature_report(&mut handle, 0x05, &mut buf).unwrap();
    assert_eq!(&buf[..n], &[0x05, 1, 2, 3], "F046 FALSIFIED: feature report mangled");

    let err = hid::get_feature_report(&mut handle, 0x05, &mut buf[..1]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Invalid);
}

/// F047: HID input arrives as whole reports
#[test]
fn f047_hid_read() {
    init_tracing();
    let (mock, mut handle) = open(hid_device(12, 0));
    let path = handle.device().path().to_string();
    mock.inject(&path, &[0x00, 0xDE, 0xAD]);
    let mut buf = [0u8; 64];
    assert_eq!(hid::read(&mut handle, &mut buf, 500).unwrap(), 3);
    assert_eq!(&buf[..3], &[0x00, 0xDE, 0xAD]);
    assert_eq!(hid::read(&mut handle, &mut buf, 0).unwrap(), 0);
}
