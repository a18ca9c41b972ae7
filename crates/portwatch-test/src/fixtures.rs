//! Realistic device identities for mock backends.
//!
//! Keys look like sysfs devpaths and locations like Linux bus locations, so
//! the same values read naturally in assertions and log output.

use portwatch_core::{DeviceInfo, DeviceType};

/// Vendor id used by the fixtures.
pub const FIXTURE_VID: u16 = 0x16c0;
/// Product id of fixture serial devices.
pub const SERIAL_PID: u16 = 0x0483;
/// Product id of fixture HID devices.
pub const HID_PID: u16 = 0x0486;

/// Key of the physical device on USB port `port`.
#[must_use]
pub fn device_key(port: u8) -> String {
    format!("/devices/pci0000:00/0000:00:14.0/usb1/1-{port}")
}

/// CDC-ACM serial port on USB port `port`, interface 0.
#[must_use]
pub fn serial_device(port: u8) -> DeviceInfo {
    DeviceInfo::new(
        device_key(port),
        DeviceType::Serial,
        format!("/dev/ttyACM{port}"),
        FIXTURE_VID,
        SERIAL_PID,
    )
    .with_location(format!("usb-1-{port}"))
    .with_serial_number(format!("{:08}", u32::from(port) * 1111))
    .with_strings("Teensyduino", "USB Serial")
}

/// Raw HID interface `interface` of the device on USB port `port`.
#[must_use]
pub fn hid_device(port: u8, interface: u8) -> DeviceInfo {
    DeviceInfo::new(
        device_key(port),
        DeviceType::Hid,
        format!("/dev/hidraw{}", u16::from(port) * 4 + u16::from(interface)),
        FIXTURE_VID,
        HID_PID,
    )
    .with_location(format!("usb-1-{port}"))
    .with_interface(interface)
    .with_strings("Teensyduino", "RawHID")
}

/// Report descriptor of a vendor-defined raw HID interface
/// (usage page 0xFFAB, usage 0x0200).
pub const RAW_HID_DESCRIPTOR: &[u8] = &[
    0x06, 0xAB, 0xFF, // Usage Page (Vendor 0xFFAB)
    0x0A, 0x00, 0x02, // Usage (0x0200)
    0xA1, 0x01, //       Collection (Application)
    0x75, 0x08, //         Report Size (8)
    0x15, 0x00, //         Logical Minimum (0)
    0x26, 0xFF, 0x00, //   Logical Maximum (255)
    0x95, 0x40, //         Report Count (64)
    0x09, 0x01, //         Usage (1)
    0x81, 0x02, //         Input (Data, Var, Abs)
    0x95, 0x40, //         Report Count (64)
    0x09, 0x02, //         Usage (2)
    0x91, 0x02, //         Output (Data, Var, Abs)
    0xC0, //             End Collection
];
