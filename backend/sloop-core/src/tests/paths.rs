use crate::SLOOP_DATA_DIR_ENV;
use crate::config::{PathSource, PathsConfig, detect_sloop_paths};

use serial_test::serial;
use tempfile::TempDir;

fn with_data_dir<T>(value: &std::path::Path, f: impl FnOnce() -> T) -> T {
    unsafe { std::env::set_var(SLOOP_DATA_DIR_ENV, value) };
    let result = f();
    unsafe { std::env::remove_var(SLOOP_DATA_DIR_ENV) };
    result
}

/// **VALUE**: Verifies the env override roots every derived directory.
#[test]
#[serial]
fn given_data_dir_env_when_detecting_then_all_dirs_derived_from_it() {
    // GIVEN: SLOOP_DATA_DIR set
    let dir = TempDir::new().unwrap();

    // WHEN: Detecting without overrides
    let paths = with_data_dir(dir.path(), || detect_sloop_paths(&PathsConfig::default())).unwrap();

    // THEN: Everything except user_home hangs off the data dir
    assert_eq!(paths.source, PathSource::EnvVar);
    assert_eq!(paths.data_dir, dir.path());
    assert_eq!(paths.storage_root, dir.path().join("storage"));
    assert_eq!(paths.work_dir, dir.path().join("work"));
    assert_eq!(paths.log_dir, dir.path().join("logs"));
    assert!(paths.user_home.ends_with(".sloop"));
}

#[test]
#[serial]
fn given_config_overrides_when_detecting_then_overrides_win() {
    let dir = TempDir::new().unwrap();
    let overrides = PathsConfig {
        storage_root: Some(dir.path().join("custom-storage")),
        work_dir: Some(dir.path().join("custom-work")),
        user_home: Some(dir.path().join("home")),
    };

    let paths = with_data_dir(dir.path(), || detect_sloop_paths(&overrides)).unwrap();

    assert_eq!(paths.storage_root, dir.path().join("custom-storage"));
    assert_eq!(paths.work_dir, dir.path().join("custom-work"));
    assert_eq!(paths.user_home, dir.path().join("home"));
    assert_eq!(paths.log_dir, dir.path().join("logs"));
}

/// **BUG THIS CATCHES**: Would catch an empty override being used as a relative data dir.
#[test]
#[serial]
fn given_blank_data_dir_env_when_detecting_then_env_ignored() {
    // GIVEN: SLOOP_DATA_DIR set to whitespace
    unsafe { std::env::set_var(SLOOP_DATA_DIR_ENV, "   ") };

    // WHEN: Detecting
    let result = detect_sloop_paths(&PathsConfig::default());
    unsafe { std::env::remove_var(SLOOP_DATA_DIR_ENV) };

    // THEN: Falls through to a platform or home location
    if let Ok(paths) = result {
        assert_ne!(paths.source, PathSource::EnvVar);
    }
}

#[test]
fn given_path_sources_when_displayed_then_human_readable() {
    assert_eq!(PathSource::EnvVar.to_string(), SLOOP_DATA_DIR_ENV);
    assert_eq!(PathSource::PlatformDefault.to_string(), "platform default");
    assert_eq!(PathSource::HomeFallback.to_string(), "home fallback");
}
