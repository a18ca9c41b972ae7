//! Cross-module scenarios run against the mock backend.


/// Installs a test-friendly tracing subscriber once per process.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
