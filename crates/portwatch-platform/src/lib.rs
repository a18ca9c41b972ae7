// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # portwatch-platform
//!
//! Operating-system backends for portwatch.
//!
//! - **Linux**: sysfs enumeration, netlink uevents for hotplug, hidraw
//!   nodes for HID and termios-configured tty nodes for serial ports
//! - **Unsupported**: fallback that fails every operation with `System`
//!
//! ## Example
//!
//! ```rust,ignore
//! use portwatch_core::{Config, DeviceFilter, enumerate};
//! use portwatch_platform::default_backend;
//!
//! let backend = default_backend(&Config::default());
//! for device in enumerate(&backend, &DeviceFilter::any())? {
//!     println!("{device}");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod detect;
pub mod error;
pub mod unsupported;

#[cfg(all(target_os = "linux", feature = "linux"))]
pub mod linux;

pub use detect::{Platform, default_backend, detect_platform};
pub use error::{ParseError, Result};
pub use unsupported::UnsupportedBackend;

#[cfg(all(target_os = "linux", feature = "linux"))]
pub use linux::LinuxBackend;
