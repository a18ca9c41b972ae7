//! Serial port settings and byte-stream I/O.
//!
//! [`set_attributes`] validates the rate and flags completely before the
//! backend is touched, so a rejected configuration never half-applies.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::device::DeviceType;
use crate::error::{Error, Result};
use crate::handle::Handle;

/// Supported baud rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum BaudRate {
    /// 110 bps.
    B110 = 110,
    /// 134 bps.
    B134 = 134,
    /// 150 bps.
    B150 = 150,
    /// 200 bps.
    B200 = 200,
    /// 300 bps.
    B300 = 300,
    /// 600 bps.
    B600 = 600,
    /// 1200 bps.
    B1200 = 1200,
    /// 1800 bps.
    B1800 = 1800,
    /// 2400 bps.
    B2400 = 2400,
    /// 4800 bps.
    B4800 = 4800,
    /// 9600 bps.
    B9600 = 9600,
    /// 19200 bps.
    B19200 = 19200,
    /// 38400 bps.
    B38400 = 38400,
    /// 57600 bps.
    B57600 = 57600,
    /// 115200 bps.
    B115200 = 115_200,
}

impl BaudRate {
    /// Every supported rate, ascending.
    pub const ALL: [Self; 15] = [
        Self::B110,
        Self::B134,
        Self::B150,
        Self::B200,
        Self::B300,
        Self::B600,
        Self::B1200,
        Self::B1800,
        Self::B2400,
        Self::B4800,
        Self::B9600,
        Self::B19200,
        Self::B38400,
        Self::B57600,
        Self::B115200,
    ];

    /// Bits per second.
    #[must_use]
    pub const fn bps(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = Error;

    fn try_from(rate: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.bps() == rate)
            .ok_or_else(|| Error::invalid(format!("Unsupported serial rate {rate}")))
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> Self {
        rate.bps()
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bps())
    }
}

/// Line-coding flags. Each group (size, parity, flow) admits one bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SerialFlags(u32);

impl SerialFlags {
    /// 7 data bits.
    pub const CSIZE_7BITS: Self = Self(0x1);
    /// 6 data bits.
    pub const CSIZE_6BITS: Self = Self(0x2);
    /// 5 data bits.
    pub const CSIZE_5BITS: Self = Self(0x4);
    /// Odd parity.
    pub const PARITY_ODD: Self = Self(0x8);
    /// Even parity.
    pub const PARITY_EVEN: Self = Self(0x10);
    /// Two stop bits.
    pub const STOP_2BITS: Self = Self(0x20);
    /// Software flow control.
    pub const FLOW_XONXOFF: Self = Self(0x40);
    /// Hardware flow control.
    pub const FLOW_RTSCTS: Self = Self(0x80);
    /// Keep modem lines raised on close.
    pub const CLOSE_NOHUP: Self = Self(0x100);

    /// Character size group.
    pub const MASK_CSIZE: Self = Self(0x7);
    /// Parity group.
    pub const MASK_PARITY: Self = Self(0x18);
    /// Stop bits group.
    pub const MASK_STOP: Self = Self(0x20);
    /// Flow control group.
    pub const MASK_FLOW: Self = Self(0xC0);
    /// Close behaviour group.
    pub const MASK_CLOSE: Self = Self(0x100);

    const KNOWN: u32 = 0x1FF;

    /// No flags: 8 data bits, no parity, 1 stop bit, no flow control.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Wraps raw bits without validation.
    #[must_use]
    pub const fn from_bits_retain(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    const fn group(self, mask: Self) -> u32 {
        self.0 & mask.0
    }

    /// Checks for unknown bits and conflicting choices within a group.
    ///
    /// # Errors
    /// Returns `Invalid` describing the first problem found.
    pub fn validate(self) -> Result<()> {
        if self.0 & !Self::KNOWN != 0 {
            return Err(Error::invalid(format!(
                "Unknown serial flag bits {:#x}",
                self.0 & !Self::KNOWN
            )));
        }
        let groups = [
            ("character size", Self::MASK_CSIZE),
            ("parity", Self::MASK_PARITY),
            ("flow control", Self::MASK_FLOW),
        ];
        for (name, mask) in groups {
            if self.group(mask).count_ones() > 1 {
                return Err(Error::invalid(format!("Conflicting serial {name} flags")));
            }
        }
        Ok(())
    }
}

impl BitOr for SerialFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SerialFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Parity mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// XON/XOFF characters.
    XonXoff,
    /// RTS/CTS lines.
    RtsCts,
}

/// Fully resolved serial configuration handed to backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Line rate.
    pub baud: BaudRate,
    /// Data bits, 5 to 8.
    pub data_bits: u8,
    /// Parity.
    pub parity: Parity,
    /// Stop bits, 1 or 2.
    pub stop_bits: u8,
    /// Flow control.
    pub flow_control: FlowControl,
    /// Drop modem lines when the port closes.
    pub hangup_on_close: bool,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud: BaudRate::B115200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControl::None,
            hangup_on_close: true,
        }
    }
}

impl SerialSettings {
    /// Resolves a raw rate and flags.
    ///
    /// # Errors
    /// Returns `Invalid` for an unsupported rate or invalid flags.
    pub fn from_flags(rate: u32, flags: SerialFlags) -> Result<Self> {
        let baud = BaudRate::try_from(rate)?;
        flags.validate()?;

        let data_bits = match flags.group(SerialFlags::MASK_CSIZE) {
            0x1 => 7,
            0x2 => 6,
            0x4 => 5,
            _ => 8,
        };
        let parity = if flags.contains(SerialFlags::PARITY_ODD) {
            Parity::Odd
        } else if flags.contains(SerialFlags::PARITY_EVEN) {
            Parity::Even
        } else {
            Parity::None
        };
        let flow_control = if flags.contains(SerialFlags::FLOW_XONXOFF) {
            FlowControl::XonXoff
        } else if flags.contains(SerialFlags::FLOW_RTSCTS) {
            FlowControl::RtsCts
        } else {
            FlowControl::None
        };

        Ok(Self {
            baud,
            data_bits,
            parity,
            stop_bits: if flags.contains(SerialFlags::STOP_2BITS) { 2 } else { 1 },
            flow_control,
            hangup_on_close: !flags.contains(SerialFlags::CLOSE_NOHUP),
        })
    }
}

impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        write!(f, "{} {}{}{}", self.baud, self.data_bits, parity, self.stop_bits)
    }
}

/// Applies rate and line coding to a serial handle.
///
/// # Errors
/// `Invalid` for a non-serial handle, an unsupported rate or invalid flags,
/// in which case the backend is not called. Backend failures propagate.
pub fn set_attributes(handle: &mut Handle, rate: u32, flags: SerialFlags) -> Result<()> {
    let channel = handle.require(DeviceType::Serial)?;
    let settings = SerialSettings::from_flags(rate, flags)?;
    channel.configure_serial(&settings)
}

/// Reads available bytes, waiting up to `timeout_ms` (negative waits forever).
///
/// Returns 0 on timeout.
///
/// # Errors
/// `Invalid` for a non-serial handle; `Io`/`System` on transfer failures.
pub fn read(handle: &mut Handle, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
    let channel = handle.require(DeviceType::Serial)?;
    if buf.is_empty() {
        return Err(Error::invalid("Serial read buffer is empty"));
    }
    channel.read(buf, timeout_ms)
}

/// Writes bytes, returning how many were transferred.
///
/// # Errors
/// `Invalid` for a non-serial handle; `Io`/`System` on transfer failures.
pub fn write(handle: &mut Handle, buf: &[u8]) -> Result<usize> {
    let channel = handle.require(DeviceType::Serial)?;
    if buf.is_empty() {
        return Ok(0);
    }
    channel.write(buf)
}
