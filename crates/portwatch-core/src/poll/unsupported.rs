//! Unsupported platform wait primitive.
//!
//! Reports a system error for every call.

use super::{WaitOutcome, WaitPrimitive, Waitable};
use crate::error::{Error, Result};

/// Placeholder primitive for targets without a native wait implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedWait;

impl WaitPrimitive for UnsupportedWait {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn limit(&self) -> Option<usize> {
        Some(super::HANDLE_ARRAY_LIMIT)
    }

    fn wait(&self, _objects: &[Waitable], _timeout_ms: i32) -> Result<WaitOutcome> {
        Err(Error::system("multiplexed wait is not supported on this platform"))
    }
}
