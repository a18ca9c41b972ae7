//! Error types for portwatch.
//!
//! Every fallible operation reports exactly one [`ErrorCode`] with a
//! descriptive message. Constructing an [`Error`] emits it through the
//! process-wide log sink (see [`crate::log`]) unless the code is masked, so
//! a failure is observable once, at the point where it is detected.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::log;

/// Result type alias for portwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fixed error code enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Allocation failure, fatal to the operation.
    Memory,
    /// Target vanished or never existed; re-enumerate.
    NotFound,
    /// Permission denied.
    Access,
    /// Transient transfer failure; retryable.
    Io,
    /// Unexpected backend failure carrying platform detail.
    System,
    /// Caller misuse.
    Invalid,
}

impl ErrorCode {
    /// All codes, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Memory,
        Self::NotFound,
        Self::Access,
        Self::Io,
        Self::System,
        Self::Invalid,
    ];

    /// Stable short name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::NotFound => "not_found",
            Self::Access => "access",
            Self::Io => "io",
            Self::System => "system",
            Self::Invalid => "invalid",
        }
    }

    /// Message used when a failure is reported without details.
    #[must_use]
    pub const fn generic_message(self) -> &'static str {
        match self {
            Self::Memory => "Memory error",
            Self::NotFound => "Not found",
            Self::Access => "Permission error",
            Self::Io => "I/O error",
            Self::System => "System error",
            Self::Invalid => "Invalid data error",
        }
    }

    /// Dense index in `0..ALL.len()`.
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A `(code, message)` failure.
///
/// Created through [`Error::new`] or one of the per-code constructors, all of
/// which report the failure to the log sink before returning it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    code: ErrorCode,
    message: String,
}

impl Error {
    /// Creates and reports an error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let err = Self {
            code,
            message: message.into(),
        };
        log::report(&err);
        err
    }

    /// Creates and reports an error carrying the generic message for `code`.
    #[must_use]
    pub fn generic(code: ErrorCode) -> Self {
        Self::new(code, code.generic_message())
    }

    /// Creates a memory error.
    #[must_use]
    pub fn memory() -> Self {
        Self::generic(ErrorCode::Memory)
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, msg)
    }

    /// Creates a permission error.
    #[must_use]
    pub fn access(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Access, msg)
    }

    /// Creates an I/O error.
    #[must_use]
    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Io, msg)
    }

    /// Creates a system error.
    #[must_use]
    pub fn system(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::System, msg)
    }

    /// Creates an invalid usage error.
    #[must_use]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Invalid, msg)
    }

    /// Maps a POSIX errno to a code and reports it.
    ///
    /// `context` describes the failed operation, e.g. `open('/dev/hidraw0')`.
    #[must_use]
    pub fn from_errno(errno: i32, context: &str) -> Self {
        let detail = std::io::Error::from_raw_os_error(errno);
        let code = code_for_errno(errno);
        let message = match code {
            ErrorCode::Memory => code.generic_message().to_string(),
            ErrorCode::Access => format!("Permission denied for {context}"),
            ErrorCode::NotFound => format!("{context} failed: device not found"),
            ErrorCode::Io => format!("I/O error during {context}"),
            _ => format!("{context} failed: {detail}"),
        };
        Self::new(code, message)
    }

    /// Maps an [`std::io::Error`] the same way as [`Error::from_errno`].
    #[must_use]
    pub fn from_io(err: &std::io::Error, context: &str) -> Self {
        match err.raw_os_error() {
            Some(errno) => Self::from_errno(errno, context),
            None => match err.kind() {
                std::io::ErrorKind::NotFound => Self::not_found(format!("{context}: {err}")),
                std::io::ErrorKind::PermissionDenied => Self::access(format!("{context}: {err}")),
                std::io::ErrorKind::OutOfMemory => Self::memory(),
                _ => Self::system(format!("{context} failed: {err}")),
            },
        }
    }

    /// The error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// The human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this error means the target is gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }
}

#[cfg(unix)]
fn code_for_errno(errno: i32) -> ErrorCode {
    match errno {
        libc::ENOMEM => ErrorCode::Memory,
        libc::EACCES | libc::EPERM => ErrorCode::Access,
        libc::ENOENT | libc::ENODEV | libc::ENXIO => ErrorCode::NotFound,
        libc::EIO => ErrorCode::Io,
        _ => ErrorCode::System,
    }
}

#[cfg(not(unix))]
fn code_for_errno(_errno: i32) -> ErrorCode {
    ErrorCode::System
}
