//! portwatch: HID and serial device enumeration, hotplug monitoring and
//! multiplexed I/O.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use portwatch::prelude::*;
//!
//! let backend = default_backend(&Config::default());
//! let mut monitor = Monitor::new(backend, DeviceFilter::of_type(DeviceType::Serial))?;
//! let mut set = DescriptorSet::new();
//! set.add(0, monitor.descriptor())?;
//!
//! if set.poll(1_000)?.contains(&0) {
//!     for event in monitor.refresh()? {
//!         println!("{event:?}");
//!     }
//! }
//! # Ok::<(), portwatch::core::Error>(())
//! ```

pub use portwatch_core as core;
pub use portwatch_platform as platform;

/// Prelude module for common imports.
pub mod prelude {
    pub use portwatch_core::{
        BaudRate, Config, DescriptorSet, Device, DeviceFilter, DeviceStatus, DeviceType, Error,
        ErrorCode, Handle, HidDescriptor, Monitor, MonitorEvent, Result, SerialFlags, Waitable,
        enumerate, hid, serial,
    };
    pub use portwatch_platform::{Platform, default_backend, detect_platform};
}
