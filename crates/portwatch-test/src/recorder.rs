//! Log capture for assertions on what the library reports.
//!
//! The log sink is process-wide, so a [`LogRecorder`] holds a global lock
//! while installed and only keeps records emitted by the installing thread.
//! Dropping it restores the default sink.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, MutexGuard};
use portwatch_core::{ErrorCode, LogLevel, LogRecord, LogSink, log_redirect};

static INSTALL_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// One captured record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    /// Severity.
    pub level: LogLevel,
    /// Error code, if the record reports a failure.
    pub code: Option<ErrorCode>,
    /// Message text.
    pub message: String,
}

#[derive(Debug)]
struct Sink {
    thread: ThreadId,
    records: Mutex<Vec<Captured>>,
}

impl LogSink for Sink {
    fn log(&self, record: &LogRecord<'_>) {
        if thread::current().id() != self.thread {
            return;
        }
        self.records.lock().push(Captured {
            level: record.level,
            code: record.code,
            message: record.message.to_string(),
        });
    }
}

/// Installed capturing sink.
#[derive(Debug)]
pub struct LogRecorder {
    sink: Arc<Sink>,
    _exclusive: MutexGuard<'static, ()>,
}

impl LogRecorder {
    /// Installs a recorder for the current thread, waiting for any other
    /// recorder to be dropped first.
    #[must_use]
    pub fn install() -> Self {
        let exclusive = INSTALL_LOCK.lock();
        let sink = Arc::new(Sink {
            thread: thread::current().id(),
            records: Mutex::new(Vec::new()),
        });
        let installed: Arc<dyn LogSink> = sink.clone();
        log_redirect(Some(installed));
        Self {
            sink,
            _exclusive: exclusive,
        }
    }

    /// Everything captured so far.
    #[must_use]
    pub fn records(&self) -> Vec<Captured> {
        self.sink.records.lock().clone()
    }

    /// Captured failure reports carrying `code`.
    #[must_use]
    pub fn errors_with(&self, code: ErrorCode) -> Vec<Captured> {
        self.sink
            .records
            .lock()
            .iter()
            .filter(|r| r.code == Some(code))
            .cloned()
            .collect()
    }

    /// Discards captured records.
    pub fn clear(&self) {
        self.sink.records.lock().clear();
    }
}

impl Drop for LogRecorder {
    fn drop(&mut self) {
        log_redirect(None);
    }
}
