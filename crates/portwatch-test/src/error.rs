//! Test error types.

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, TestError>;

/// Harness errors.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// Harness setup or bookkeeping failed.
    #[error("harness error: {0}")]
    Harness(String),

    /// Assertion failed.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// Nothing became ready in time.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Library error.
    #[error("portwatch error: {0}")]
    Core(#[from] portwatch_core::Error),
}

impl TestError {
    /// Creates a harness error.
    #[must_use]
    pub fn harness(msg: impl Into<String>) -> Self {
        Self::Harness(msg.into())
    }

    /// Creates an assertion error.
    #[must_use]
    pub fn assertion(msg: impl Into<String>) -> Self {
        Self::Assertion(msg.into())
    }
}
