//! Library configuration.
//!
//! Everything has a default, so an empty TOML document is a valid
//! configuration. Values are validated at load time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorCode, Result};
use crate::log;
use crate::poll::{CHUNK_SLICE_MS, DEFAULT_CAPACITY};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Descriptor set and wait tuning.
    #[serde(default)]
    pub poll: PollConfig,

    /// Log masking.
    #[serde(default)]
    pub log: LogConfig,

    /// Linux backend paths.
    #[serde(default)]
    pub linux: LinuxConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `Invalid` if a value is out of range.
    pub fn validate(&self) -> Result<()> {
        self.poll.validate()?;
        self.linux.validate()?;
        Ok(())
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    /// Returns `Invalid` if the document does not parse or validate.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::invalid(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::from_io(&e, &format!("read config '{}'", path.display())))?;
        Self::from_toml_str(&content)
    }
}

/// Descriptor set and wait tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Entries a descriptor set accepts.
    #[serde(default = "default_descriptor_capacity")]
    pub descriptor_capacity: usize,

    /// Longest block on one chunk when a set exceeds the primitive limit.
    #[serde(default = "default_chunk_slice_ms")]
    pub chunk_slice_ms: i32,
}

const fn default_descriptor_capacity() -> usize {
    DEFAULT_CAPACITY
}

const fn default_chunk_slice_ms() -> i32 {
    CHUNK_SLICE_MS
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            descriptor_capacity: default_descriptor_capacity(),
            chunk_slice_ms: default_chunk_slice_ms(),
        }
    }
}

impl PollConfig {
    /// Validates poll tuning.
    ///
    /// # Errors
    /// Returns `Invalid` for a zero capacity or a non-positive slice.
    pub fn validate(&self) -> Result<()> {
        if self.descriptor_capacity == 0 {
            return Err(Error::invalid("poll.descriptor_capacity must be at least 1"));
        }
        if self.chunk_slice_ms <= 0 {
            return Err(Error::invalid("poll.chunk_slice_ms must be positive"));
        }
        Ok(())
    }
}

/// Error codes to mask at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Codes whose log emission is suppressed.
    #[serde(default)]
    pub masked: Vec<ErrorCode>,
}

impl LogConfig {
    /// Masks every configured code once.
    pub fn apply(&self) {
        for &code in &self.masked {
            log::error_mask(code);
        }
    }

    /// Undoes [`LogConfig::apply`].
    pub fn revert(&self) {
        for &code in &self.masked {
            log::error_unmask(code);
        }
    }
}

/// Which netlink multicast group delivers hotplug events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UeventSource {
    /// Events re-broadcast by udev after rule processing.
    #[default]
    Udev,
    /// Raw kernel events.
    Kernel,
}

/// Linux backend paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxConfig {
    /// Mount point of sysfs.
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,

    /// Directory holding device nodes.
    #[serde(default = "default_dev_root")]
    pub dev_root: PathBuf,

    /// Hotplug event source.
    #[serde(default)]
    pub uevent_source: UeventSource,
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys")
}

fn default_dev_root() -> PathBuf {
    PathBuf::from("/dev")
}

impl Default for LinuxConfig {
    fn default() -> Self {
        Self {
            sysfs_root: default_sysfs_root(),
            dev_root: default_dev_root(),
            uevent_source: UeventSource::default(),
        }
    }
}

impl LinuxConfig {
    /// Validates backend paths.
    ///
    /// # Errors
    /// Returns `Invalid` for empty paths.
    pub fn validate(&self) -> Result<()> {
        if self.sysfs_root.as_os_str().is_empty() {
            return Err(Error::invalid("linux.sysfs_root cannot be empty"));
        }
        if self.dev_root.as_os_str().is_empty() {
            return Err(Error::invalid("linux.dev_root cannot be empty"));
        }
        Ok(())
    }
}
