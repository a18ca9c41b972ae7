//! `poll(2)` wait primitive.

use super::{WaitOutcome, WaitPrimitive, Waitable};
use crate::error::{Error, Result};

/// Level-triggered `poll(2)` over file descriptors, no per-call limit.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixPoll;

const READY_MASK: libc::c_short = libc::POLLIN | libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;
const WRITABLE_MASK: libc::c_short = libc::POLLOUT | libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;

impl WaitPrimitive for PosixPoll {
    fn name(&self) -> &'static str {
        "poll"
    }

    fn limit(&self) -> Option<usize> {
        None
    }

    fn wait(&self, objects: &[Waitable], timeout_ms: i32) -> Result<WaitOutcome> {
        let mut fds = objects
            .iter()
            .map(|waitable| match *waitable {
                Waitable::Fd(fd) => Ok(libc::pollfd {
                    fd,
                    events: libc::POLLIN,
                    revents: 0,
                }),
                Waitable::Handle(_) => Err(Error::invalid(format!(
                    "poll() cannot wait on kernel {waitable}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        poll_fds(&mut fds, timeout_ms, READY_MASK)
    }
}

/// Waits for `fd` to accept output.
pub(crate) fn wait_output(fd: i32, timeout_ms: i32) -> Result<WaitOutcome> {
    let mut fds = [libc::pollfd {
        fd,
        events: libc::POLLOUT,
        revents: 0,
    }];
    poll_fds(&mut fds, timeout_ms, WRITABLE_MASK)
}

fn poll_fds(fds: &mut [libc::pollfd], timeout_ms: i32, mask: libc::c_short) -> Result<WaitOutcome> {
    let timeout = if timeout_ms < 0 { -1 } else { timeout_ms };

    // SAFETY: `fds` is a live, correctly sized array of pollfd for the call.
    #[allow(unsafe_code)]
    let r = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout) };

    if r < 0 {
        let err = std::io::Error::last_os_error();
        return match err.raw_os_error() {
            Some(libc::EINTR) => Ok(WaitOutcome::Interrupted),
            Some(libc::ENOMEM) => Err(Error::memory()),
            _ => Err(Error::system(format!("poll() failed: {err}"))),
        };
    }
    if r == 0 {
        return Ok(WaitOutcome::TimedOut);
    }

    let ready = fds
        .iter()
        .enumerate()
        .filter(|(_, pfd)| pfd.revents & mask != 0)
        .map(|(i, _)| i)
        .collect();
    Ok(WaitOutcome::Ready(ready))
}
