//! Multiplexed waiting over heterogeneous native waitables.
//!
//! A [`DescriptorSet`] maps caller-chosen IDs to [`Waitable`]s. Polling hands
//! the registered objects to a [`WaitPrimitive`]: `poll(2)` on POSIX targets,
//! which takes any number of descriptors, or a handle-array wait that accepts
//! at most [`HANDLE_ARRAY_LIMIT`] objects per call. Sets larger than a
//! primitive's limit are waited in chunks (see [`chunked`]) without changing
//! what the caller observes.
//!
//! ## Platform constants
//!
//! | Constant | Value | Meaning |
//! |----------|-------|---------|
//! | [`DEFAULT_CAPACITY`] | 256 | Entries a set accepts by default |
//! | [`HANDLE_ARRAY_LIMIT`] | 64 | `MAXIMUM_WAIT_OBJECTS` of handle-array waits |
//! | [`CHUNK_SLICE_MS`] | 10 | Longest block on one chunk before re-sweeping |
//! | [`POLL_TOLERANCE_MS`] | 25 | Lateness allowed past a poll timeout |

mod chunked;
mod set;

#[cfg(unix)]
mod posix;

#[cfg(not(unix))]
mod unsupported;

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

pub use set::{DescriptorSet, Entry};

#[cfg(unix)]
pub use posix::PosixPoll;

#[cfg(not(unix))]
pub use unsupported::UnsupportedWait;

/// Native wait primitive of the build target.
#[cfg(unix)]
pub type NativeWait = PosixPoll;

/// Native wait primitive of the build target.
#[cfg(not(unix))]
pub type NativeWait = UnsupportedWait;

/// Entries a [`DescriptorSet`] accepts unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 256;

/// Per-call object limit of handle-array wait primitives.
pub const HANDLE_ARRAY_LIMIT: usize = 64;

/// Longest time the chunked engine blocks on a single chunk.
pub const CHUNK_SLICE_MS: i32 = 10;

/// How late a timed-out poll may return, in milliseconds.
pub const POLL_TOLERANCE_MS: u64 = 25;

/// A native object a thread can block on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waitable {
    /// POSIX file descriptor.
    Fd(i32),
    /// Kernel handle value (handle-array platforms).
    Handle(usize),
}

impl Waitable {
    /// Whether the value can name a live object at all.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        match self {
            Self::Fd(fd) => fd >= 0,
            Self::Handle(handle) => handle != 0,
        }
    }
}

impl std::fmt::Display for Waitable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fd(fd) => write!(f, "fd {fd}"),
            Self::Handle(handle) => write!(f, "handle {handle:#x}"),
        }
    }
}

/// Result of one native wait call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Indices (into the slice passed to `wait`) of ready objects.
    Ready(Vec<usize>),
    /// Nothing became ready before the timeout.
    TimedOut,
    /// A signal interrupted the wait.
    Interrupted,
}

/// One platform multiplexing call.
pub trait WaitPrimitive {
    /// Short name used in error messages.
    fn name(&self) -> &'static str;

    /// Maximum objects accepted per call, `None` when unbounded.
    fn limit(&self) -> Option<usize>;

    /// Blocks until an object in `objects` is ready or `timeout_ms` elapses
    /// (negative blocks indefinitely, zero does not block).
    fn wait(&self, objects: &[Waitable], timeout_ms: i32) -> Result<WaitOutcome>;
}

/// Returns the native wait primitive.
#[must_use]
pub fn native() -> NativeWait {
    NativeWait::default()
}

/// Milliseconds on a monotonic clock.
///
/// The epoch is the first call in the process; only differences matter.
#[must_use]
pub fn millis() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = *EPOCH.get_or_init(Instant::now);
    u64::try_from(epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Recomputes what is left of `timeout` (ms) since `start` (from [`millis`]).
///
/// Negative timeouts stay negative (wait forever); an expired timeout yields 0.
#[must_use]
pub fn adjust_timeout(timeout: i32, start: u64) -> i32 {
    if timeout < 0 {
        return -1;
    }
    let end = start.saturating_add(timeout as u64);
    let now = millis();
    if now >= end {
        return 0;
    }
    i32::try_from(end - now).unwrap_or(i32::MAX)
}

/// Absolute deadline derived from a millisecond timeout.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    end: Option<Instant>,
}

impl Deadline {
    /// Deadline `timeout_ms` from now; negative never expires.
    #[must_use]
    pub fn after(timeout_ms: i32) -> Self {
        let end = u64::try_from(timeout_ms)
            .ok()
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        Self { end }
    }

    /// Remaining milliseconds, rounded up; `-1` when unbounded.
    #[must_use]
    pub fn remaining_ms(&self) -> i32 {
        let Some(end) = self.end else {
            return -1;
        };
        let left = end.saturating_duration_since(Instant::now());
        let ms = left.as_nanos().div_ceil(1_000_000);
        i32::try_from(ms).unwrap_or(i32::MAX)
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.end.is_some_and(|end| Instant::now() >= end)
    }
}

/// Waits on `objects` with `primitive`, chunking when the primitive's limit
/// is smaller than the object count, and restarting after interruptions.
///
/// Returns the indices of all ready objects, empty on timeout.
pub fn wait_all(
    primitive: &dyn WaitPrimitive,
    objects: &[Waitable],
    timeout_ms: i32,
    slice_ms: i32,
) -> Result<Vec<usize>> {
    let deadline = Deadline::after(timeout_ms);
    loop {
        let remaining = deadline.remaining_ms();
        let outcome = match primitive.limit() {
            Some(limit) if objects.len() > limit => {
                chunked::wait(primitive, objects, limit, remaining, slice_ms)?
            }
            _ => primitive.wait(objects, remaining)?,
        };
        match outcome {
            WaitOutcome::Ready(indices) => return Ok(indices),
            WaitOutcome::TimedOut | WaitOutcome::Interrupted => {
                if deadline.expired() || remaining == 0 {
                    return Ok(Vec::new());
                }
            }
        }
    }
}

/// Waits until a single object is readable. Returns `false` on timeout.
pub fn wait_readable(waitable: Waitable, timeout_ms: i32) -> Result<bool> {
    if !waitable.is_valid() {
        return Err(Error::invalid(format!("cannot wait on invalid {waitable}")));
    }
    let ready = wait_all(&native(), &[waitable], timeout_ms, CHUNK_SLICE_MS)?;
    Ok(!ready.is_empty())
}

/// Waits until a single object accepts output. Returns `false` on timeout.
///
/// Hang-up and error conditions count as writable so the following write
/// reports them.
pub fn wait_writable(waitable: Waitable, timeout_ms: i32) -> Result<bool> {
    let Waitable::Fd(fd) = waitable else {
        return Err(Error::invalid(format!("cannot wait for output on {waitable}")));
    };
    if fd < 0 {
        return Err(Error::invalid(format!("cannot wait on invalid {waitable}")));
    }
    let deadline = Deadline::after(timeout_ms);
    loop {
        let remaining = deadline.remaining_ms();
        match output_wait(fd, remaining)? {
            WaitOutcome::Ready(_) => return Ok(true),
            WaitOutcome::TimedOut | WaitOutcome::Interrupted => {
                if deadline.expired() || remaining == 0 {
                    return Ok(false);
                }
            }
        }
    }
}

#[cfg(unix)]
fn output_wait(fd: i32, timeout_ms: i32) -> Result<WaitOutcome> {
    posix::wait_output(fd, timeout_ms)
}

#[cfg(not(unix))]
fn output_wait(fd: i32, _timeout_ms: i32) -> Result<WaitOutcome> {
    Err(Error::system(format!("output wait on fd {fd} is not supported on this platform")))
}
