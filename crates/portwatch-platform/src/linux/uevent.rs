//! Hotplug notifications from `NETLINK_KOBJECT_UEVENT`.
//!
//! Two wire formats arrive on the socket. The kernel sends
//! `action@devpath\0KEY=VALUE\0...`; udev re-broadcasts processed events
//! behind a binary header:
//!
//! | Offset | Size | Field | Byte order |
//! |--------|------|-------|------------|
//! | 0 | 8 | `"libudev\0"` | - |
//! | 8 | 4 | magic `0xfeedcafe` | big endian |
//! | 12 | 4 | header size | native |
//! | 16 | 4 | properties offset | native |
//! | 20 | 4 | properties length | native |

use std::os::fd::{AsRawFd, OwnedFd};

use nix::errno::Errno;
use nix::sys::socket::{
    AddressFamily, NetlinkAddr, SockFlag, SockProtocol, SockType, bind, recvfrom, socket,
};
use portwatch_core::config::UeventSource;
use portwatch_core::{DeviceFilter, Error, Hotplug, HotplugSource, Result, Waitable};
use tracing::{debug, trace, warn};

use super::sysfs::{Sysfs, device_type_for};
use crate::error::ParseError;

const UDEV_PREFIX: &[u8] = b"libudev\0";
const UDEV_MAGIC: u32 = 0xfeed_cafe;
const UDEV_HEADER_MIN: usize = 24;

const GROUP_KERNEL: u32 = 1;
const GROUP_UDEV: u32 = 2;

const MESSAGE_SIZE: usize = 8192;

/// What happened to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Device appeared.
    Add,
    /// Device disappeared.
    Remove,
    /// Any other action (`change`, `bind`, `move`...).
    Other(String),
}

impl Action {
    fn parse(value: &str) -> Self {
        match value {
            "add" => Self::Add,
            "remove" => Self::Remove,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One decoded uevent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uevent {
    /// Action.
    pub action: Action,
    /// Sysfs path relative to the sysfs root, starting with `/devices`.
    pub devpath: String,
    /// Kernel subsystem.
    pub subsystem: String,
    /// Device node name under `/dev`, if any.
    pub devname: Option<String>,
}

impl Uevent {
    /// Decodes a kernel or udev message.
    ///
    /// # Errors
    /// Returns a [`ParseError`] for truncated, malformed or incomplete messages.
    pub fn parse(buf: &[u8]) -> std::result::Result<Self, ParseError> {
        let properties = if buf.starts_with(UDEV_PREFIX) {
            udev_properties(buf)?
        } else {
            kernel_properties(buf)?
        };

        let mut action = None;
        let mut devpath = None;
        let mut subsystem = None;
        let mut devname = None;
        for entry in properties.split(|&b| b == 0) {
            let Ok(entry) = std::str::from_utf8(entry) else {
                continue;
            };
            let Some((key, value)) = entry.split_once('=') else {
                continue;
            };
            match key {
                "ACTION" => action = Some(Action::parse(value)),
                "DEVPATH" => devpath = Some(value.to_string()),
                "SUBSYSTEM" => subsystem = Some(value.to_string()),
                "DEVNAME" => devname = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            action: action.ok_or(ParseError::MissingField("ACTION"))?,
            devpath: devpath.ok_or(ParseError::MissingField("DEVPATH"))?,
            subsystem: subsystem.ok_or(ParseError::MissingField("SUBSYSTEM"))?,
            devname,
        })
    }
}

fn read_u32(buf: &[u8], offset: usize, big_endian: bool) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    if big_endian {
        u32::from_be_bytes(bytes)
    } else {
        u32::from_ne_bytes(bytes)
    }
}

fn udev_properties(buf: &[u8]) -> std::result::Result<&[u8], ParseError> {
    if buf.len() < UDEV_HEADER_MIN {
        return Err(ParseError::Truncated(buf.len()));
    }
    let magic = read_u32(buf, 8, true);
    if magic != UDEV_MAGIC {
        return Err(ParseError::BadMagic(magic));
    }
    let offset = read_u32(buf, 16, false) as usize;
    let length = read_u32(buf, 20, false) as usize;
    match offset.checked_add(length) {
        Some(end) if offset >= UDEV_HEADER_MIN && end <= buf.len() => Ok(&buf[offset..end]),
        _ => Err(ParseError::PropertiesOutOfBounds {
            offset,
            length,
            size: buf.len(),
        }),
    }
}

fn kernel_properties(buf: &[u8]) -> std::result::Result<&[u8], ParseError> {
    let header_end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(ParseError::MalformedHeader)?;
    if !buf[..header_end].contains(&b'@') {
        return Err(ParseError::MalformedHeader);
    }
    Ok(&buf[header_end + 1..])
}

/// Hotplug source reading uevents from a non-blocking netlink socket.
#[derive(Debug)]
pub struct NetlinkSource {
    socket: OwnedFd,
    sysfs: Sysfs,
    filter: DeviceFilter,
}

impl NetlinkSource {
    /// Opens and binds the socket to the multicast group of `source`.
    ///
    /// # Errors
    /// `Access`/`System` when the socket cannot be created or bound.
    pub fn open(source: UeventSource, sysfs: Sysfs, filter: DeviceFilter) -> Result<Self> {
        let socket = socket(
            AddressFamily::Netlink,
            SockType::Raw,
            SockFlag::SOCK_CLOEXEC | SockFlag::SOCK_NONBLOCK,
            SockProtocol::NetlinkKObjectUEvent,
        )
        .map_err(|e| Error::from_errno(e as i32, "socket(NETLINK_KOBJECT_UEVENT)"))?;

        let groups = match source {
            UeventSource::Udev => GROUP_UDEV,
            UeventSource::Kernel => GROUP_KERNEL,
        };
        bind(socket.as_raw_fd(), &NetlinkAddr::new(0, groups))
            .map_err(|e| Error::from_errno(e as i32, "bind(NETLINK_KOBJECT_UEVENT)"))?;

        debug!(?source, groups, "listening for uevents");
        Ok(Self {
            socket,
            sysfs,
            filter,
        })
    }

    fn accept_sender(sender: Option<&NetlinkAddr>) -> bool {
        let Some(addr) = sender else {
            return false;
        };
        match addr.groups() {
            // Unicast from an untrusted process.
            0 => false,
            // Only the kernel may send on the kernel group.
            GROUP_KERNEL => addr.pid() == 0,
            _ => true,
        }
    }

    fn translate(&self, event: Uevent) -> Option<Hotplug> {
        let device_type = device_type_for(&event.subsystem)?;
        if self.filter.device_type.is_some_and(|t| t != device_type) {
            return None;
        }
        match event.action {
            Action::Add => {
                let info = self.sysfs.device_at(&event.devpath, device_type)?;
                self.filter.matches(&info).then_some(Hotplug::Added(info))
            }
            Action::Remove => Some(Hotplug::Removed { key: event.devpath }),
            Action::Other(_) => None,
        }
    }
}

impl HotplugSource for NetlinkSource {
    fn waitable(&self) -> Waitable {
        Waitable::Fd(self.socket.as_raw_fd())
    }

    fn drain(&mut self, out: &mut Vec<Hotplug>) -> Result<()> {
        let mut buf = vec![0u8; MESSAGE_SIZE];
        loop {
            let (len, sender) = match recvfrom::<NetlinkAddr>(self.socket.as_raw_fd(), &mut buf) {
                Ok(received) => received,
                Err(Errno::EAGAIN) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(Errno::ENOBUFS) => {
                    return Err(Error::system(
                        "uevent socket overran its receive buffer, hotplug events were lost",
                    ));
                }
                Err(Errno::ENOMEM) => return Err(Error::memory()),
                Err(e) => return Err(Error::from_errno(e as i32, "recvfrom(uevent)")),
            };
            if !Self::accept_sender(sender.as_ref()) {
                trace!("ignoring uevent from unexpected sender");
                continue;
            }
            match Uevent::parse(&buf[..len]) {
                Ok(event) => {
                    trace!(?event, "uevent");
                    out.extend(self.translate(event));
                }
                Err(e) => warn!(error = %e, "dropping malformed uevent"),
            }
        }
    }
}
