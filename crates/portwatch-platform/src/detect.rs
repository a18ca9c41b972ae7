//! Platform detection and backend selection.

use std::sync::Arc;

use portwatch_core::{Backend, Config};
use tracing::info;

use crate::unsupported::UnsupportedBackend;

/// Platforms with a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Linux: sysfs, netlink uevents, hidraw and termios.
    Linux,
    /// Anything else.
    Unsupported,
}

impl Platform {
    /// Returns the platform name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Platform this build runs on.
///
/// Linux counts only when the `linux` feature is enabled.
#[must_use]
pub const fn detect_platform() -> Platform {
    if cfg!(all(target_os = "linux", feature = "linux")) {
        Platform::Linux
    } else {
        Platform::Unsupported
    }
}

/// Backend for [`detect_platform`], configured from `config`.
#[must_use]
pub fn default_backend(config: &Config) -> Arc<dyn Backend> {
    let platform = detect_platform();
    info!(%platform, "selecting device backend");
    backend_for(platform, config)
}

#[cfg_attr(not(all(target_os = "linux", feature = "linux")), allow(unused_variables))]
fn backend_for(platform: Platform, config: &Config) -> Arc<dyn Backend> {
    match platform {
        #[cfg(all(target_os = "linux", feature = "linux"))]
        Platform::Linux => Arc::new(crate::linux::LinuxBackend::new(&config.linux)),
        _ => Arc::new(UnsupportedBackend),
    }
}
