//! Device discovery through sysfs.
//!
//! Class devices under `class/hidraw` and `class/tty` are symlinks into the
//! `devices` tree. Walking up from the resolved directory finds the USB
//! interface (first ancestor with `bInterfaceNumber`) and the USB device
//! (first ancestor with `idVendor` and `busnum`). Class devices without a USB
//! parent, such as virtual consoles, are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use portwatch_core::{DeviceFilter, DeviceInfo, DeviceType, Error, Result};
use tracing::{debug, trace};

use crate::error::ParseError;

/// Kernel subsystem for a device family.
#[must_use]
pub const fn subsystem(device_type: DeviceType) -> &'static str {
    match device_type {
        DeviceType::Hid => "hidraw",
        DeviceType::Serial => "tty",
    }
}

/// Device family for a kernel subsystem.
#[must_use]
pub fn device_type_for(subsystem: &str) -> Option<DeviceType> {
    match subsystem {
        "hidraw" => Some(DeviceType::Hid),
        "tty" => Some(DeviceType::Serial),
        _ => None,
    }
}

/// Sysfs and device node roots.
#[derive(Debug, Clone)]
pub struct Sysfs {
    root: PathBuf,
    dev_root: PathBuf,
}

impl Sysfs {
    /// Uses `root` as the sysfs mount point and `dev_root` for device nodes.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, dev_root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dev_root: dev_root.into(),
        }
    }

    /// Lists every USB-backed hidraw and tty device that passes `filter`.
    ///
    /// # Errors
    /// Returns an error when a class directory exists but cannot be listed.
    pub fn enumerate(&self, filter: &DeviceFilter) -> Result<Vec<DeviceInfo>> {
        let mut found = Vec::new();
        for device_type in [DeviceType::Hid, DeviceType::Serial] {
            if filter.device_type.is_some_and(|t| t != device_type) {
                continue;
            }
            let class_dir = self.root.join("class").join(subsystem(device_type));
            let entries = match fs::read_dir(&class_dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::from_io(&e, &format!("read_dir('{}')", class_dir.display())));
                }
            };

            let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
            paths.sort();
            for path in paths {
                found.extend(
                    self.read_class_device(&path, device_type)
                        .filter(|info| filter.matches(info)),
                );
            }
        }
        debug!(count = found.len(), root = %self.root.display(), "sysfs enumeration");
        Ok(found)
    }

    /// Reads the device at `devpath` (relative to the sysfs root, as carried
    /// by uevents).
    #[must_use]
    pub fn device_at(&self, devpath: &str, device_type: DeviceType) -> Option<DeviceInfo> {
        let path = self.root.join(devpath.trim_start_matches('/'));
        self.read_class_device(&path, device_type)
    }

    /// Builds a [`DeviceInfo`] for a class device directory or link.
    ///
    /// Returns `None` when the device has no USB parent, no device node, or
    /// unreadable identity attributes.
    #[must_use]
    pub fn read_class_device(&self, class_path: &Path, device_type: DeviceType) -> Option<DeviceInfo> {
        let dir = fs::canonicalize(class_path).ok()?;
        let root = fs::canonicalize(&self.root).ok()?;
        let key = devpath_of(&root, &dir)?;

        let iface_dir = ancestor_with(&dir, &root, &["bInterfaceNumber"])?;
        let usb_dir = ancestor_with(&dir, &root, &["idVendor", "busnum"])?;

        let devname = read_uevent_devname(&dir).or_else(|| {
            dir.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })?;
        let node = self.dev_root.join(&devname);
        if !node.exists() {
            trace!(node = %node.display(), "device node missing, skipping");
            return None;
        }

        let identity = UsbIdentity::read(&usb_dir)
            .map_err(|e| debug!(device = %key, error = %e, "skipping device"))
            .ok()?;
        let interface_number = interface_number(&iface_dir)?;

        let mut info = DeviceInfo::new(
            key,
            device_type,
            node.to_string_lossy(),
            identity.vid,
            identity.pid,
        )
        .with_location(identity.location)
        .with_interface(interface_number);
        info.manufacturer = read_attr(&usb_dir, "manufacturer");
        info.product = read_attr(&usb_dir, "product");
        info.serial_number = read_attr(&usb_dir, "serial");
        Some(info)
    }
}

struct UsbIdentity {
    vid: u16,
    pid: u16,
    location: String,
}

impl UsbIdentity {
    fn read(usb_dir: &Path) -> std::result::Result<Self, ParseError> {
        let vid = hex_attr(usb_dir, "idVendor")?;
        let pid = hex_attr(usb_dir, "idProduct")?;
        let busnum = read_attr(usb_dir, "busnum").ok_or_else(|| ParseError::attribute("busnum", ""))?;
        let devpath = read_attr(usb_dir, "devpath").ok_or_else(|| ParseError::attribute("devpath", ""))?;
        Ok(Self {
            vid,
            pid,
            location: location(&busnum, &devpath),
        })
    }
}

/// Bus location string, `usb-{busnum}-{devpath}` with dots turned to dashes.
#[must_use]
pub fn location(busnum: &str, devpath: &str) -> String {
    format!("usb-{busnum}-{devpath}").replace('.', "-")
}

fn devpath_of(root: &Path, dir: &Path) -> Option<String> {
    let rel = dir.strip_prefix(root).ok()?;
    Some(format!("/{}", rel.to_string_lossy()))
}

fn ancestor_with(start: &Path, root: &Path, files: &[&str]) -> Option<PathBuf> {
    start
        .ancestors()
        .skip(1)
        .take_while(|dir| dir.starts_with(root) && *dir != root)
        .find(|dir| files.iter().all(|f| dir.join(f).is_file()))
        .map(Path::to_path_buf)
}

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    let value = fs::read_to_string(dir.join(name)).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn hex_attr(dir: &Path, name: &'static str) -> std::result::Result<u16, ParseError> {
    let raw = read_attr(dir, name).ok_or_else(|| ParseError::attribute(name, ""))?;
    u16::from_str_radix(&raw, 16).map_err(|_| ParseError::attribute(name, raw))
}

fn interface_number(iface_dir: &Path) -> Option<u8> {
    let attr = read_attr(iface_dir, "bInterfaceNumber")
        .and_then(|raw| u8::from_str_radix(&raw, 16).ok());
    if attr.is_some() {
        return attr;
    }
    // Interface directories end in "<config>.<interface>".
    let name = iface_dir.file_name()?.to_string_lossy().into_owned();
    name.rsplit('.').next()?.parse().ok()
}

fn read_uevent_devname(dir: &Path) -> Option<String> {
    let uevent = fs::read_to_string(dir.join("uevent")).ok()?;
    uevent
        .lines()
        .find_map(|line| line.strip_prefix("DEVNAME="))
        .map(str::to_string)
}
