//! hidraw channels.
//!
//! Request numbers follow `include/uapi/linux/hidraw.h`.

use std::fs::File;
use std::os::fd::AsRawFd;

use nix::sys::ioctl::ioctl_num_type;
use portwatch_core::{Channel, Error, Result, Waitable};
use tracing::trace;

use super::fd;

// ============================================================================
// ioctl encoding helpers (match kernel _IOR/_IOC macros)
// ============================================================================

const HIDRAW_MAGIC: u32 = b'H' as u32;
const IOC_SIZE_MAX: usize = (1 << 14) - 1;

const fn _ioc(dir: u32, ty: u32, nr: u32, sz: usize) -> u32 {
    (dir << 30) | ((sz as u32) << 16) | (ty << 8) | nr
}

const fn _ior(ty: u32, nr: u32, sz: usize) -> u32 {
    _ioc(2, ty, nr, sz)
}

/// Largest report descriptor the kernel hands out.
pub const HID_MAX_DESCRIPTOR_SIZE: usize = 4096;

/// `struct hidraw_report_descriptor`.
#[repr(C)]
struct ReportDescriptor {
    size: u32,
    value: [u8; HID_MAX_DESCRIPTOR_SIZE],
}

/// Get report descriptor size - _IOR('H', 0x01, int)
pub const HIDIOCGRDESCSIZE: u32 = _ior(HIDRAW_MAGIC, 0x01, size_of::<libc::c_int>());

/// Get report descriptor - _IOR('H', 0x02, struct hidraw_report_descriptor)
pub const HIDIOCGRDESC: u32 = _ior(HIDRAW_MAGIC, 0x02, size_of::<ReportDescriptor>());

/// Send feature report - _IOC(_IOC_WRITE|_IOC_READ, 'H', 0x06, len)
#[must_use]
pub const fn hidiocsfeature(len: usize) -> u32 {
    _ioc(3, HIDRAW_MAGIC, 0x06, len)
}

/// Get feature report - _IOC(_IOC_WRITE|_IOC_READ, 'H', 0x07, len)
#[must_use]
pub const fn hidiocgfeature(len: usize) -> u32 {
    _ioc(3, HIDRAW_MAGIC, 0x07, len)
}

/// Result of an ioctl: `Ok(return value)` or the errno.
#[allow(unsafe_code)]
fn ioctl_ptr<T>(file: &File, request: u32, arg: *mut T) -> std::result::Result<libc::c_int, i32> {
    loop {
        // SAFETY: the caller passes a request whose encoded size matches
        // the memory behind `arg`, which outlives the call.
        let r = unsafe { libc::ioctl(file.as_raw_fd(), request as ioctl_num_type, arg) };
        if r >= 0 {
            return Ok(r);
        }
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO);
        if errno != libc::EINTR {
            return Err(errno);
        }
    }
}

/// Open hidraw node.
#[derive(Debug)]
pub struct HidrawChannel {
    file: File,
    path: String,
}

impl HidrawChannel {
    /// Opens the hidraw node at `path`.
    ///
    /// # Errors
    /// See [`fd::open_node`].
    pub fn open(path: &str) -> Result<Self> {
        let file = fd::open_node(path)?;
        trace!(path, "hidraw opened");
        Ok(Self {
            file,
            path: path.to_string(),
        })
    }

    fn ioctl_error(&self, errno: i32, request: &str) -> Error {
        match errno {
            libc::EIO | libc::ENXIO => {
                Error::io(format!("I/O error while talking to '{}'", self.path))
            }
            _ => Error::system(format!(
                "ioctl('{}', {request}) failed: {}",
                self.path,
                std::io::Error::from_raw_os_error(errno)
            )),
        }
    }
}

impl Channel for HidrawChannel {
    fn waitable(&self) -> Waitable {
        fd::waitable(&self.file)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        fd::read_timeout(&mut self.file, &self.path, buf, timeout_ms)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        // USB requests time out after 5 s; O_NONBLOCK is not honoured for writes.
        fd::write_once(&mut self.file, &self.path, buf)
    }

    fn report_descriptor(&mut self) -> Result<Vec<u8>> {
        let mut size: libc::c_int = 0;
        ioctl_ptr(&self.file, HIDIOCGRDESCSIZE, &raw mut size)
            .map_err(|errno| self.ioctl_error(errno, "HIDIOCGRDESCSIZE"))?;

        let size = usize::try_from(size).unwrap_or(0).min(HID_MAX_DESCRIPTOR_SIZE);
        let mut report = Box::new(ReportDescriptor {
            size: size as u32,
            value: [0; HID_MAX_DESCRIPTOR_SIZE],
        });
        ioctl_ptr(&self.file, HIDIOCGRDESC, &raw mut *report)
            .map_err(|errno| self.ioctl_error(errno, "HIDIOCGRDESC"))?;

        let len = (report.size as usize).min(HID_MAX_DESCRIPTOR_SIZE);
        Ok(report.value[..len].to_vec())
    }

    fn send_feature_report(&mut self, report: &[u8]) -> Result<usize> {
        if report.len() > IOC_SIZE_MAX {
            return Err(Error::invalid(format!(
                "Feature report of {} bytes exceeds the ioctl size limit",
                report.len()
            )));
        }
        let mut copy = report.to_vec();
        match ioctl_ptr(&self.file, hidiocsfeature(copy.len()), copy.as_mut_ptr()) {
            Ok(_) => Ok(report.len()),
            Err(libc::EAGAIN) => Ok(0),
            Err(errno) => Err(self.ioctl_error(errno, "HIDIOCSFEATURE")),
        }
    }

    fn get_feature_report(&mut self, report_id: u8, buf: &mut [u8]) -> Result<usize> {
        let Some(first) = buf.first_mut() else {
            return Err(Error::invalid("Feature report buffer is empty"));
        };
        *first = report_id;
        let len = buf.len().min(IOC_SIZE_MAX);
        match ioctl_ptr(&self.file, hidiocgfeature(len), buf.as_mut_ptr()) {
            Ok(n) => Ok(usize::try_from(n).unwrap_or(0)),
            Err(libc::EAGAIN) => Ok(0),
            Err(errno) => Err(self.ioctl_error(errno, "HIDIOCGFEATURE")),
        }
    }
}
