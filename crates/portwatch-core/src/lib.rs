// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # portwatch-core
//!
//! Platform-independent core of the portwatch device access library.
//!
//! This crate turns OS-specific enumeration and hotplug notifications into a
//! stable, reference-counted device registry, and lets a caller block on any
//! mix of device handles and monitors with a single timeout:
//!
//! - [`Device`]: shared device record, `Online` until removed, then
//!   `Disconnected` for good
//! - [`Handle`]: open I/O session holding its device alive
//! - [`Monitor`]: hotplug-tracking device list with one waitable
//! - [`DescriptorSet`]: ID-tagged waitables polled together
//! - [`serial`] and [`hid`]: validated transfers and settings
//! - [`log`]: redirectable sink and per-code error masking
//!
//! OS access goes through the [`Backend`] trait; `portwatch-platform`
//! provides the real implementations.
//!
//! ## Example
//!
//! ```rust,ignore
//! use portwatch_core::{DescriptorSet, DeviceFilter, DeviceType, Monitor};
//!
//! let mut monitor = Monitor::new(backend, DeviceFilter::of_type(DeviceType::Serial))?;
//! let mut set = DescriptorSet::new();
//! set.add(0, monitor.descriptor())?;
//! loop {
//!     if set.poll(-1)?.contains(&0) {
//!         for event in monitor.refresh()? {
//!             println!("{event:?}");
//!         }
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod handle;
pub mod hid;
pub mod log;
#[cfg(all(unix, any(test, feature = "mock")))]
pub mod mock;
pub mod monitor;
pub mod poll;
pub mod serial;
#[cfg(test)]
mod tests;

pub use backend::{Backend, Channel, Hotplug, HotplugSource};
pub use config::{Config, LinuxConfig, LogConfig, PollConfig, UeventSource};
pub use device::{Device, DeviceFilter, DeviceInfo, DeviceStatus, DeviceType, enumerate};
pub use error::{Error, ErrorCode, Result};
pub use handle::Handle;
pub use hid::HidDescriptor;
pub use log::{
    LogLevel, LogRecord, LogSink, MaskGuard, TracingSink, error_mask, error_unmask, log_redirect,
    mask_scope,
};
pub use monitor::{Monitor, MonitorEvent, MonitorId};
pub use poll::{
    DescriptorSet, WaitOutcome, WaitPrimitive, Waitable, adjust_timeout, millis, wait_readable,
    wait_writable,
};
pub use serial::{BaudRate, FlowControl, Parity, SerialFlags, SerialSettings};
