//! Device node I/O shared by hidraw and tty channels.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;

use portwatch_core::{Error, Result, Waitable, wait_readable, wait_writable};

/// Opens a device node read-write, non-blocking, without becoming its
/// controlling terminal.
///
/// # Errors
/// `Access` on permission problems, `NotFound` when the node is gone.
pub fn open_node(path: &str) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC | libc::O_NOCTTY)
        .open(path)
        .map_err(|e| Error::from_io(&e, &format!("open('{path}')")))
}

/// The node as a waitable.
#[must_use]
pub fn waitable(file: &File) -> Waitable {
    Waitable::Fd(file.as_raw_fd())
}

fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EIO | libc::ENXIO))
}

/// Waits up to `timeout_ms` for input, then reads what is available.
///
/// Returns 0 on timeout or when the read would block.
///
/// # Errors
/// `Io` when the device went away, including a node that polled ready but
/// reads end-of-file, `System` for other failures.
pub fn read_timeout(file: &mut File, path: &str, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
    let waited = timeout_ms != 0;
    if waited && !wait_readable(waitable(file), timeout_ms)? {
        return Ok(0);
    }
    loop {
        match file.read(buf) {
            Ok(0) if waited && !buf.is_empty() => {
                return Err(Error::io(format!("'{path}' hung up")));
            }
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(0),
            Err(e) if is_disconnect(&e) => {
                return Err(Error::io(format!("I/O error while reading from '{path}'")));
            }
            Err(e) => return Err(Error::system(format!("read('{path}') failed: {e}"))),
        }
    }
}

/// Writes once, restarting on interruption.
///
/// Returns the bytes accepted, 0 when the write would block.
///
/// # Errors
/// `Io` when the device went away, `System` for other failures.
pub fn write_once(file: &mut File, path: &str, buf: &[u8]) -> Result<usize> {
    loop {
        match file.write(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(0),
            Err(e) if is_disconnect(&e) => {
                return Err(Error::io(format!("I/O error while writing to '{path}'")));
            }
            Err(e) => return Err(Error::system(format!("write('{path}') failed: {e}"))),
        }
    }
}

/// Writes at least one byte, waiting for the node to drain while its output
/// queue is full.
///
/// Returns the bytes accepted, which may be fewer than `buf.len()`.
///
/// # Errors
/// `Io` when the device went away, `System` for other failures.
pub fn write_blocking(file: &mut File, path: &str, buf: &[u8]) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    loop {
        let n = write_once(file, path, buf)?;
        if n > 0 {
            return Ok(n);
        }
        wait_writable(waitable(file), -1)?;
    }
}
