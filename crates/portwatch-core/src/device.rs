//! Device records.
//!
//! A [`Device`] is a shared, reference-counted snapshot of one device
//! interface. Cloning takes a reference and dropping releases it; the record
//! is freed when the last clone, handle or monitor entry goes away. Status
//! moves from [`DeviceStatus::Online`] to [`DeviceStatus::Disconnected`]
//! exactly once and never back; a replugged device is a new record.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::error::Result;
use crate::handle::Handle;
use crate::monitor::{MonitorId, MonitorToken};

/// Device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// HID-class device accessed by reports.
    Hid,
    /// Serial port accessed as a byte stream.
    Serial,
}

impl DeviceType {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hid => "hid",
            Self::Serial => "serial",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reachability of a device record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DeviceStatus {
    /// The device was removed; terminal.
    Disconnected = 0,
    /// The device is present.
    Online = 1,
}

impl DeviceStatus {
    const fn from_u8(value: u8) -> Self {
        if value == Self::Online as u8 {
            Self::Online
        } else {
            Self::Disconnected
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Online => f.write_str("online"),
        }
    }
}

/// Identity of one device interface as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// OS identity key (sysfs devpath on Linux). Shared by all interfaces of
    /// one physical device.
    pub key: String,
    /// Device family.
    pub device_type: DeviceType,
    /// Bus location, e.g. `usb-1-2-4`.
    pub location: String,
    /// USB interface number.
    pub interface_number: u8,
    /// Device node path.
    pub path: String,
    /// Vendor id.
    pub vid: u16,
    /// Product id.
    pub pid: u16,
    /// Manufacturer string.
    #[serde(default)]
    pub manufacturer: Option<String>,
    /// Product string.
    #[serde(default)]
    pub product: Option<String>,
    /// Serial number string.
    #[serde(default)]
    pub serial_number: Option<String>,
}

impl DeviceInfo {
    /// Creates an identity with the required fields; strings start unset.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        device_type: DeviceType,
        path: impl Into<String>,
        vid: u16,
        pid: u16,
    ) -> Self {
        Self {
            key: key.into(),
            device_type,
            location: String::new(),
            interface_number: 0,
            path: path.into(),
            vid,
            pid,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }

    /// Sets the bus location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Sets the interface number.
    #[must_use]
    pub const fn with_interface(mut self, interface_number: u8) -> Self {
        self.interface_number = interface_number;
        self
    }

    /// Sets the serial number string.
    #[must_use]
    pub fn with_serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    /// Sets manufacturer and product strings.
    #[must_use]
    pub fn with_strings(mut self, manufacturer: impl Into<String>, product: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self.product = Some(product.into());
        self
    }
}

/// Selects which devices a monitor or enumeration surfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    /// Only this family.
    pub device_type: Option<DeviceType>,
    /// Only this vendor id.
    pub vid: Option<u16>,
    /// Only this product id.
    pub pid: Option<u16>,
}

impl DeviceFilter {
    /// Matches every device.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            device_type: None,
            vid: None,
            pid: None,
        }
    }

    /// Matches one device family.
    #[must_use]
    pub const fn of_type(device_type: DeviceType) -> Self {
        Self {
            device_type: Some(device_type),
            vid: None,
            pid: None,
        }
    }

    /// Restricts to a vendor id.
    #[must_use]
    pub const fn with_vid(mut self, vid: u16) -> Self {
        self.vid = Some(vid);
        self
    }

    /// Restricts to a product id.
    #[must_use]
    pub const fn with_pid(mut self, pid: u16) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Whether `info` passes the filter.
    #[must_use]
    pub fn matches(&self, info: &DeviceInfo) -> bool {
        self.device_type.is_none_or(|t| t == info.device_type)
            && self.vid.is_none_or(|v| v == info.vid)
            && self.pid.is_none_or(|p| p == info.pid)
    }
}

struct DeviceInner {
    info: DeviceInfo,
    status: AtomicU8,
    monitor: Weak<MonitorToken>,
    backend: Arc<dyn Backend>,
}

/// Shared handle to a device record.
///
/// Equality is record identity: two `Device`s are equal when they share the
/// same record, not when their fields match.
#[derive(Clone)]
pub struct Device(Arc<DeviceInner>);

impl Device {
    pub(crate) fn new(info: DeviceInfo, backend: Arc<dyn Backend>, monitor: Weak<MonitorToken>) -> Self {
        Self(Arc::new(DeviceInner {
            info,
            status: AtomicU8::new(DeviceStatus::Online as u8),
            monitor,
            backend,
        }))
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> DeviceStatus {
        DeviceStatus::from_u8(self.0.status.load(Ordering::Acquire))
    }

    /// Whether the device is still present.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status() == DeviceStatus::Online
    }

    /// Marks the record disconnected. Irreversible.
    pub(crate) fn mark_disconnected(&self) {
        self.0
            .status
            .store(DeviceStatus::Disconnected as u8, Ordering::Release);
    }

    /// Full identity.
    #[must_use]
    pub fn info(&self) -> &DeviceInfo {
        &self.0.info
    }

    /// OS identity key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.0.info.key
    }

    /// Device family.
    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        self.0.info.device_type
    }

    /// Bus location.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.0.info.location
    }

    /// Interface number.
    #[must_use]
    pub fn interface_number(&self) -> u8 {
        self.0.info.interface_number
    }

    /// Device node path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.0.info.path
    }

    /// Vendor id.
    #[must_use]
    pub fn vid(&self) -> u16 {
        self.0.info.vid
    }

    /// Product id.
    #[must_use]
    pub fn pid(&self) -> u16 {
        self.0.info.pid
    }

    /// Manufacturer string, if the device reports one.
    #[must_use]
    pub fn manufacturer_string(&self) -> Option<&str> {
        self.0.info.manufacturer.as_deref()
    }

    /// Product string, if the device reports one.
    #[must_use]
    pub fn product_string(&self) -> Option<&str> {
        self.0.info.product.as_deref()
    }

    /// Serial number string, if the device reports one.
    #[must_use]
    pub fn serial_number_string(&self) -> Option<&str> {
        self.0.info.serial_number.as_deref()
    }

    /// Id of the monitor that produced this record, while it is alive.
    #[must_use]
    pub fn monitor_id(&self) -> Option<MonitorId> {
        self.0.monitor.upgrade().map(|token| token.id)
    }

    /// Number of live references to this record.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Whether `self` and `other` are the same record.
    #[must_use]
    pub fn same_record(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Opens an I/O handle on this device.
    ///
    /// # Errors
    /// `NotFound` when the record is disconnected or the OS object vanished,
    /// `Access` on permission problems, `System`/`Io` on backend failures.
    pub fn open(&self) -> Result<Handle> {
        Handle::open(self)
    }

    pub(crate) fn backend(&self) -> &Arc<dyn Backend> {
        &self.0.backend
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.same_record(other)
    }
}

impl Eq for Device {}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("info", &self.0.info)
            .field("status", &self.status())
            .field("backend", &self.0.backend.name())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} device '{}' [{:04x}:{:04x}] at {}",
            self.device_type(),
            self.path(),
            self.vid(),
            self.pid(),
            self.location()
        )
    }
}

/// Lists matching devices once, without monitoring.
///
/// The returned records have no monitor.
///
/// # Errors
/// Propagates backend enumeration failures.
pub fn enumerate(backend: &Arc<dyn Backend>, filter: &DeviceFilter) -> Result<Vec<Device>> {
    let infos = backend.enumerate(filter)?;
    Ok(infos
        .into_iter()
        .filter(|info| filter.matches(info))
        .map(|info| Device::new(info, Arc::clone(backend), Weak::new()))
        .collect())
}
