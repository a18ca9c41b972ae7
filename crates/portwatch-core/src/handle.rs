//! Open I/O sessions.

use std::fmt;

use crate::backend::Channel;
use crate::device::{Device, DeviceType};
use crate::error::{Error, Result};
use crate::log;
use crate::poll::Waitable;

/// An open I/O session on one device.
///
/// The handle keeps its [`Device`] alive. Closing (explicitly with
/// [`Handle::close`] or by dropping) releases the OS resources and the device
/// reference; it does not change the device status.
pub struct Handle {
    device: Device,
    channel: Box<dyn Channel>,
}

impl Handle {
    pub(crate) fn open(device: &Device) -> Result<Self> {
        if !device.is_online() {
            return Err(Error::not_found(format!(
                "Device '{}' is disconnected",
                device.path()
            )));
        }
        let channel = device.backend().open(device.info())?;
        log::debug(format!("Opened {device}"));
        Ok(Self {
            device: device.clone(),
            channel,
        })
    }

    /// The device this handle is bound to.
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The object that becomes ready when input is pending.
    #[must_use]
    pub fn descriptor(&self) -> Waitable {
        self.channel.waitable()
    }

    /// Closes the handle.
    pub fn close(self) {
        drop(self);
    }

    pub(crate) fn require(&mut self, device_type: DeviceType) -> Result<&mut dyn Channel> {
        if self.device.device_type() != device_type {
            return Err(Error::invalid(format!(
                "Handle for '{}' is not a {device_type} device",
                self.device.path()
            )));
        }
        Ok(self.channel.as_mut())
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        log::debug(format!("Closing '{}'", self.device.path()));
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("device", &self.device.path())
            .field("descriptor", &self.descriptor())
            .finish()
    }
}
