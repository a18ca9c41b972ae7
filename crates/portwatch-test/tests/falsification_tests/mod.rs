//! Popperian Falsification Tests for portwatch
//!
//! Each test in this module attempts to falsify a specific claim about
//! portwatch. A passing test means the claim survived the falsification attempt.

// Allow test-specific patterns that are denied in production code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod lifecycle;
mod monitor;
mod platform;
mod poll;
mod serial;

/// Routes library tracing output through the test writer.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
