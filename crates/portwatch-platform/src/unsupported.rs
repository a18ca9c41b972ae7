//! Fallback for operating systems without a backend.

use portwatch_core::{
    Backend, Channel, DeviceFilter, DeviceInfo, Error, HotplugSource, Result,
};

/// Backend whose every operation fails with `System`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedBackend;

fn unsupported(operation: &str) -> Error {
    Error::system(format!(
        "{operation} is not supported on {}",
        std::env::consts::OS
    ))
}

impl Backend for UnsupportedBackend {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn enumerate(&self, _filter: &DeviceFilter) -> Result<Vec<DeviceInfo>> {
        Err(unsupported("Device enumeration"))
    }

    fn subscribe(&self, _filter: &DeviceFilter) -> Result<Box<dyn HotplugSource>> {
        Err(unsupported("Device monitoring"))
    }

    fn open(&self, info: &DeviceInfo) -> Result<Box<dyn Channel>> {
        Err(unsupported(&format!("Opening '{}'", info.path)))
    }
}
