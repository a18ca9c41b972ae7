//! HID report I/O and report descriptor parsing.

use serde::{Deserialize, Serialize};

use crate::device::DeviceType;
use crate::error::{Error, Result};
use crate::handle::Handle;

/// Top-level usage of a HID device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HidDescriptor {
    /// Usage page of the first application collection.
    pub usage_page: u16,
    /// Usage of the first application collection.
    pub usage: u16,
}

const ITEM_USAGE_PAGE: u8 = 0x04;
const ITEM_USAGE: u8 = 0x08;
const ITEM_COLLECTION: u8 = 0xA0;
const ITEM_LONG: u8 = 0xFE;

impl HidDescriptor {
    /// Extracts usage page and usage from a raw report descriptor.
    ///
    /// Walks short items until the first Collection, skipping long items.
    /// An item truncated by the end of the buffer stops the walk.
    ///
    /// # Errors
    /// Currently infallible; the signature matches the other report calls.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mut desc = Self::default();
        let mut i = 0;
        while i < raw.len() {
            let prefix = raw[i];
            if prefix == ITEM_LONG {
                // bDataSize, bLongItemTag, then the data bytes.
                let Some(&data_size) = raw.get(i + 1) else {
                    break;
                };
                i += 3 + usize::from(data_size);
                continue;
            }
            let kind = prefix & 0xFC;
            let size = match prefix & 0x3 {
                3 => 4,
                n => usize::from(n),
            };
            if i + size >= raw.len() {
                break;
            }

            let data = raw[i + 1..=i + size]
                .iter()
                .rev()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));

            match kind {
                ITEM_USAGE_PAGE => desc.usage_page = data as u16,
                ITEM_USAGE => desc.usage = data as u16,
                ITEM_COLLECTION => break,
                _ => {}
            }
            i += size + 1;
        }
        Ok(desc)
    }
}

/// Reads one input report, waiting up to `timeout_ms` (negative waits forever).
///
/// Returns 0 on timeout.
///
/// # Errors
/// `Invalid` for a non-HID handle or empty buffer; `Io`/`System` on failure.
pub fn read(handle: &mut Handle, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
    let channel = handle.require(DeviceType::Hid)?;
    if buf.is_empty() {
        return Err(Error::invalid("HID read buffer is empty"));
    }
    channel.read(buf, timeout_ms)
}

/// Writes an output report; the first byte is the report id.
///
/// Reports shorter than two bytes transfer nothing and return 0.
///
/// # Errors
/// `Invalid` for a non-HID handle; `Io`/`System` on failure.
pub fn write(handle: &mut Handle, report: &[u8]) -> Result<usize> {
    let channel = handle.require(DeviceType::Hid)?;
    if report.len() < 2 {
        return Ok(0);
    }
    channel.write(report)
}

/// Sends a feature report; the first byte is the report id.
///
/// Reports shorter than two bytes transfer nothing and return 0.
///
/// # Errors
/// `Invalid` for a non-HID handle; `Io`/`System` on failure.
pub fn send_feature_report(handle: &mut Handle, report: &[u8]) -> Result<usize> {
    let channel = handle.require(DeviceType::Hid)?;
    if report.len() < 2 {
        return Ok(0);
    }
    channel.send_feature_report(report)
}

/// Reads feature report `report_id` into `buf`.
///
/// # Errors
/// `Invalid` for a non-HID handle or a buffer too small for a report;
/// `Io`/`System` on failure.
pub fn get_feature_report(handle: &mut Handle, report_id: u8, buf: &mut [u8]) -> Result<usize> {
    let channel = handle.require(DeviceType::Hid)?;
    if buf.len() < 2 {
        return Err(Error::invalid("Feature report buffer needs room for id and payload"));
    }
    channel.get_feature_report(report_id, buf)
}

/// Reads and parses the device's report descriptor.
///
/// # Errors
/// `Invalid` for a non-HID handle; backend failures propagate.
pub fn parse_descriptor(handle: &mut Handle) -> Result<HidDescriptor> {
    let channel = handle.require(DeviceType::Hid)?;
    let raw = channel.report_descriptor()?;
    HidDescriptor::parse(&raw)
}
