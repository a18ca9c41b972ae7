//! Backend traits implemented per operating system.
//!
//! The core never talks to the OS directly. A [`Backend`] enumerates devices,
//! subscribes to hotplug notifications and opens [`Channel`]s; everything
//! else (reference counting, the monitor registry, waiting, validation) lives
//! in this crate.

use std::fmt;

use crate::device::{DeviceFilter, DeviceInfo};
use crate::error::{Error, Result};
use crate::poll::Waitable;
use crate::serial::SerialSettings;

/// A hotplug notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hotplug {
    /// A device interface appeared.
    Added(DeviceInfo),
    /// Every interface with this OS key disappeared.
    Removed {
        /// OS identity key of the removed device.
        key: String,
    },
}

/// Per-OS device access.
pub trait Backend: Send + Sync + fmt::Debug {
    /// Short backend name, e.g. `linux`.
    fn name(&self) -> &'static str;

    /// Lists the devices currently present.
    ///
    /// Backends may pre-filter; the core filters again.
    fn enumerate(&self, filter: &DeviceFilter) -> Result<Vec<DeviceInfo>>;

    /// Starts receiving hotplug notifications.
    fn subscribe(&self, filter: &DeviceFilter) -> Result<Box<dyn HotplugSource>>;

    /// Opens an I/O channel to a device.
    fn open(&self, info: &DeviceInfo) -> Result<Box<dyn Channel>>;
}

/// A stream of pending hotplug notifications with one waitable.
pub trait HotplugSource: Send + fmt::Debug {
    /// Object that becomes ready while notifications are pending.
    fn waitable(&self) -> Waitable;

    /// Moves every pending notification into `out` without blocking.
    ///
    /// On failure, notifications drained before the error stay in `out`.
    fn drain(&mut self, out: &mut Vec<Hotplug>) -> Result<()>;
}

/// An open OS-level I/O session.
///
/// Transfer methods that do not apply to the device family keep their
/// default implementation, which fails with `Invalid`.
pub trait Channel: Send + fmt::Debug {
    /// The single object that becomes ready when input is available.
    fn waitable(&self) -> Waitable;

    /// Reads available input, waiting up to `timeout_ms`. Returns 0 on timeout.
    fn read(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;

    /// Writes `buf`, returning the number of bytes transferred.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Applies serial line settings.
    fn configure_serial(&mut self, _settings: &SerialSettings) -> Result<()> {
        Err(Error::invalid("Channel does not support serial settings"))
    }

    /// Returns the raw HID report descriptor.
    fn report_descriptor(&mut self) -> Result<Vec<u8>> {
        Err(Error::invalid("Channel has no HID report descriptor"))
    }

    /// Sends a HID feature report (first byte is the report id).
    fn send_feature_report(&mut self, _report: &[u8]) -> Result<usize> {
        Err(Error::invalid("Channel does not support feature reports"))
    }

    /// Reads HID feature report `report_id` into `buf`.
    fn get_feature_report(&mut self, _report_id: u8, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::invalid("Channel does not support feature reports"))
    }
}
