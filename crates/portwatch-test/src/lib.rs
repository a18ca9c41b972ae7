// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # portwatch-test
//!
//! Testing infrastructure for portwatch.
//!
//! This crate provides:
//! - **Hotplug harness**: mock backend, monitor and descriptor set wired
//!   like an application event loop
//! - **Fault plans**: scripted one-shot backend failures
//! - **Log recorder**: captures what the library reports
//! - **Poll timing**: checks timeouts against the documented tolerance
//! - **Falsification tests**: claims about the library that each test tries
//!   to refute (`tests/falsification.rs`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use portwatch_test::{HotplugHarness, fixtures::serial_device};
//!
//! let mut harness = HotplugHarness::new()?;
//! harness.plug(serial_device(1));
//! let events = harness.next_events(1_000)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod faults;
pub mod fixtures;
pub mod harness;
pub mod recorder;
pub mod timing;

pub use error::{Result, TestError};
pub use faults::FaultPlan;
pub use harness::{DEFAULT_MONITOR_ID, HotplugHarness, HotplugHarnessBuilder};
pub use recorder::{Captured, LogRecorder};
pub use timing::PollTiming;
