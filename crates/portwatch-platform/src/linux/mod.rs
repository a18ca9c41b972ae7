//! Linux backend.
//!
//! Enumeration reads sysfs, hotplug events arrive on a
//! `NETLINK_KOBJECT_UEVENT` socket, HID devices are hidraw nodes and serial
//! ports are tty nodes configured through termios.

pub mod fd;
pub mod hidraw;
pub mod sysfs;
pub mod tty;
pub mod uevent;

use portwatch_core::{
    Backend, Channel, DeviceFilter, DeviceInfo, DeviceType, HotplugSource, LinuxConfig, Result,
};
use tracing::debug;

pub use hidraw::HidrawChannel;
pub use sysfs::Sysfs;
pub use tty::TtyChannel;
pub use uevent::{NetlinkSource, Uevent};

/// sysfs + netlink + hidraw/tty backend.
#[derive(Debug, Clone)]
pub struct LinuxBackend {
    config: LinuxConfig,
    sysfs: Sysfs,
}

impl LinuxBackend {
    /// Creates a backend rooted at the configured paths.
    #[must_use]
    pub fn new(config: &LinuxConfig) -> Self {
        Self {
            sysfs: Sysfs::new(&config.sysfs_root, &config.dev_root),
            config: config.clone(),
        }
    }

    /// Backend configuration.
    #[must_use]
    pub fn config(&self) -> &LinuxConfig {
        &self.config
    }
}

impl Default for LinuxBackend {
    fn default() -> Self {
        Self::new(&LinuxConfig::default())
    }
}

impl Backend for LinuxBackend {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn enumerate(&self, filter: &DeviceFilter) -> Result<Vec<DeviceInfo>> {
        self.sysfs.enumerate(filter)
    }

    fn subscribe(&self, filter: &DeviceFilter) -> Result<Box<dyn HotplugSource>> {
        let source = NetlinkSource::open(self.config.uevent_source, self.sysfs.clone(), *filter)?;
        Ok(Box::new(source))
    }

    fn open(&self, info: &DeviceInfo) -> Result<Box<dyn Channel>> {
        debug!(path = %info.path, device_type = %info.device_type, "opening device node");
        Ok(match info.device_type {
            DeviceType::Hid => Box::new(HidrawChannel::open(&info.path)?),
            DeviceType::Serial => Box::new(TtyChannel::open(&info.path)?),
        })
    }
}
