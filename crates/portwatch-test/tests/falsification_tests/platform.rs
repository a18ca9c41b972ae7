//! Falsification Tests: Category G - Platform Selection (F058-F060)

use std::sync::Arc;

use portwatch_core::{Backend, Config, DeviceFilter, ErrorCode, Monitor, enumerate};
use portwatch_platform::{Platform, UnsupportedBackend, default_backend, detect_platform};

/// F058: The default backend matches the detected platform
#[test]
fn f058_default_backend_matches_platform() {
    let backend = default_backend(&Config::default());
    assert_eq!(backend.name(), detect_platform().name(), "F058 FALSIFIED");
    if cfg!(target_os = "linux") {
        assert_eq!(detect_platform(), Platform::Linux);
    }
}

/// F059: The unsupported backend fails every entry point with SYSTEM
#[test]
fn f059_unsupported_backend_fails_cleanly() {
    let backend: Arc<dyn Backend> = Arc::new(UnsupportedBackend);
    let err = enumerate(&backend, &DeviceFilter::any()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::System, "F059 FALSIFIED");
    let err = Monitor::new(backend, DeviceFilter::any()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::System, "F059 FALSIFIED");
}

/// F060: A missing sysfs tree enumerates nothing instead of failing
#[cfg(target_os = "linux")]
#[test]
fn f060_linux_backend_empty_tree() {
    let config = Config::from_toml_str(
        r#"
        [linux]
        sysfs_root = "/nonexistent/portwatch/sys"
        dev_root = "/nonexistent/portwatch/dev"
        "#,
    )
    .unwrap();
    let backend = default_backend(&config);
    let devices = enumerate(&backend, &DeviceFilter::any()).unwrap();
    assert!(devices.is_empty(), "F060 FALSIFIED: devices from an empty tree");
}
