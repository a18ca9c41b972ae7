//! Scripted backend failures.
//!
//! A [`FaultPlan`] queues one-shot failures on a [`MockBackend`]. Each entry
//! fails the next call of its operation with the given code; later calls
//! succeed again.

use portwatch_core::ErrorCode;
use portwatch_core::mock::{MockBackend, MockOp};

/// Ordered list of one-shot backend failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    faults: Vec<(MockOp, ErrorCode)>,
}

impl FaultPlan {
    /// Creates an empty plan.
    #[must_use]
    pub const fn new() -> Self {
        Self { faults: Vec::new() }
    }

    /// Fails the next `op` with `code`.
    #[must_use]
    pub fn fail(mut self, op: MockOp, code: ErrorCode) -> Self {
        self.faults.push((op, code));
        self
    }

    /// Device vanished between enumeration and open.
    #[must_use]
    pub fn vanished_on_open() -> Self {
        Self::new().fail(MockOp::Open, ErrorCode::NotFound)
    }

    /// Device unplugged mid-transfer.
    #[must_use]
    pub fn unplugged_mid_transfer() -> Self {
        Self::new()
            .fail(MockOp::Read, ErrorCode::Io)
            .fail(MockOp::Write, ErrorCode::Io)
    }

    /// Hotplug source overflowed.
    #[must_use]
    pub fn lost_notifications() -> Self {
        Self::new().fail(MockOp::Drain, ErrorCode::System)
    }

    /// Planned faults in order.
    #[must_use]
    pub fn faults(&self) -> &[(MockOp, ErrorCode)] {
        &self.faults
    }

    /// Queues every fault on `backend`.
    pub fn apply(&self, backend: &MockBackend) {
        for &(op, code) in &self.faults {
            tracing::debug!(?op, %code, "injecting backend fault");
            backend.fail_next(op, code);
        }
    }
}
