//! Poll latency measurement.

use std::time::{Duration, Instant};

use portwatch_core::poll::POLL_TOLERANCE_MS;
use portwatch_core::{DescriptorSet, WaitPrimitive};

use crate::error::{Result, TestError};

/// Outcome of one timed poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTiming {
    /// Requested timeout in milliseconds.
    pub timeout_ms: i32,
    /// Wall time the call took.
    pub elapsed: Duration,
    /// IDs the call returned.
    pub ready: Vec<u32>,
}

impl PollTiming {
    /// Polls `set` natively and records how long it took.
    ///
    /// # Errors
    /// Propagates the poll failure.
    pub fn measure(set: &DescriptorSet, timeout_ms: i32) -> Result<Self> {
        let start = Instant::now();
        let ready = set.poll(timeout_ms)?;
        Ok(Self {
            timeout_ms,
            elapsed: start.elapsed(),
            ready,
        })
    }

    /// Polls `set` through `primitive` and records how long it took.
    ///
    /// # Errors
    /// Propagates the poll failure.
    pub fn measure_with(
        set: &DescriptorSet,
        primitive: &dyn WaitPrimitive,
        timeout_ms: i32,
    ) -> Result<Self> {
        let start = Instant::now();
        let ready = set.poll_with(primitive, timeout_ms)?;
        Ok(Self {
            timeout_ms,
            elapsed: start.elapsed(),
            ready,
        })
    }

    /// Checks a timed-out poll: nothing ready, and the call lasted at least
    /// the timeout but no more than the timeout plus the tolerance.
    ///
    /// # Errors
    /// `Assertion` describing the violation.
    pub fn check_timed_out(&self) -> Result<()> {
        if !self.ready.is_empty() {
            return Err(TestError::assertion(format!(
                "expected timeout, got ready ids {:?}",
                self.ready
            )));
        }
        let timeout = Duration::from_millis(u64::try_from(self.timeout_ms).unwrap_or(0));
        let ceiling = timeout + Duration::from_millis(POLL_TOLERANCE_MS);
        if self.elapsed < timeout {
            return Err(TestError::assertion(format!(
                "poll({}) returned early after {:?}",
                self.timeout_ms, self.elapsed
            )));
        }
        if self.elapsed > ceiling {
            return Err(TestError::assertion(format!(
                "poll({}) overran to {:?} (ceiling {ceiling:?})",
                self.timeout_ms, self.elapsed
            )));
        }
        Ok(())
    }
}
