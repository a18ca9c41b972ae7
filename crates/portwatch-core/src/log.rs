//! Process-wide log sink and error masking.
//!
//! The sink starts out as [`TracingSink`], which forwards every record to
//! `tracing`. [`log_redirect`] replaces it; the last installed sink wins and
//! sinks never stack. Masks are counted per [`ErrorCode`] so that nested
//! `error_mask`/`error_unmask` pairs compose.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorCode};

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Something unexpected that the library recovered from.
    Warning,
    /// A failure returned to the caller.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// One message delivered to a [`LogSink`].
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    /// Severity.
    pub level: LogLevel,
    /// Error code for failure reports, `None` for status messages.
    pub code: Option<ErrorCode>,
    /// Rendered message.
    pub message: &'a str,
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    /// Receives one record.
    fn log(&self, record: &LogRecord<'_>);
}

impl<F> LogSink for F
where
    F: Fn(&LogRecord<'_>) + Send + Sync,
{
    fn log(&self, record: &LogRecord<'_>) {
        self(record);
    }
}

/// Default sink: forwards to `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, record: &LogRecord<'_>) {
        let code = record.code.map(ErrorCode::name);
        match record.level {
            LogLevel::Debug => tracing::debug!(code, "{}", record.message),
            LogLevel::Warning => tracing::warn!(code, "{}", record.message),
            LogLevel::Error => tracing::error!(code, "{}", record.message),
        }
    }
}

static SINK: LazyLock<RwLock<Arc<dyn LogSink>>> =
    LazyLock::new(|| RwLock::new(Arc::new(TracingSink)));

static MASKS: [AtomicU32; ErrorCode::ALL.len()] = [const { AtomicU32::new(0) }; 6];

/// Installs `sink` as the process-wide sink, or restores the default
/// [`TracingSink`] when `None`.
pub fn log_redirect(sink: Option<Arc<dyn LogSink>>) {
    let sink = sink.unwrap_or_else(|| Arc::new(TracingSink));
    *SINK.write() = sink;
}

/// Suppresses log emission of `code` until the matching [`error_unmask`].
pub fn error_mask(code: ErrorCode) {
    MASKS[code.index()].fetch_add(1, Ordering::AcqRel);
}

/// Undoes one [`error_mask`] for `code`. Unmasking an unmasked code is a no-op.
pub fn error_unmask(code: ErrorCode) {
    let _ = MASKS[code.index()].fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
        n.checked_sub(1)
    });
}

/// Whether `code` is currently masked.
#[must_use]
pub fn is_masked(code: ErrorCode) -> bool {
    MASKS[code.index()].load(Ordering::Acquire) > 0
}

/// Masks `code` for the lifetime of the returned guard.
#[must_use = "the mask is released when the guard is dropped"]
pub fn mask_scope(code: ErrorCode) -> MaskGuard {
    error_mask(code);
    MaskGuard { code }
}

/// RAII guard returned by [`mask_scope`].
#[derive(Debug)]
pub struct MaskGuard {
    code: ErrorCode,
}

impl Drop for MaskGuard {
    fn drop(&mut self) {
        error_unmask(self.code);
    }
}

/// Emits a status message at `level`.
pub fn log(level: LogLevel, message: impl AsRef<str>) {
    emit(&LogRecord {
        level,
        code: None,
        message: message.as_ref(),
    });
}

/// Emits a debug message.
pub fn debug(message: impl AsRef<str>) {
    log(LogLevel::Debug, message);
}

/// Emits a warning.
pub fn warning(message: impl AsRef<str>) {
    log(LogLevel::Warning, message);
}

/// Reports a failure unless its code is masked.
pub(crate) fn report(err: &Error) {
    if is_masked(err.code()) {
        return;
    }
    emit(&LogRecord {
        level: LogLevel::Error,
        code: Some(err.code()),
        message: err.message(),
    });
}

fn emit(record: &LogRecord<'_>) {
    // Clone out of the lock so a sink may itself call log_redirect.
    let sink = Arc::clone(&SINK.read());
    sink.log(record);
}
