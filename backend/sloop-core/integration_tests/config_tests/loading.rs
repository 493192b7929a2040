use sloop_core::SLOOP_DATA_DIR_ENV;
use sloop_core::config::{CONFIG_FILE_NAME, FileConfigurationProvider, SloopConfig, detect_sloop_paths};
use sloop_core::instance::build_initialize_params;

use std::fs;

use serial_test::serial;
use tempfile::TempDir;

/// **VALUE**: Verifies a config file on disk flows all the way into the handshake payload.
///
/// **WHY THIS MATTERS**: This is the path the host binary takes at startup.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Path overrides from the file are ignored in favor of detected defaults
/// - Connections or languages are lost between config and params
#[test]
#[serial]
fn given_config_file_and_data_dir_when_loaded_then_params_reflect_both() {
    // GIVEN: A data dir override and a config file with a storage override
    let data = TempDir::new().unwrap();
    let config_dir = TempDir::new().unwrap();
    let storage = data.path().join("elsewhere");
    fs::write(
        config_dir.path().join(CONFIG_FILE_NAME),
        format!(
            r#"
[paths]
storage_root = "{}"

[languages]
standalone = ["JAVA"]
extra_connected = ["KOTLIN", "JAVA"]

[[connections]]
kind = "sonarcloud"
id = "cloud"
organization = "acme"
"#,
            storage.display()
        ),
    )
    .unwrap();
    unsafe { std::env::set_var(SLOOP_DATA_DIR_ENV, data.path()) };

    // WHEN: Loading config, detecting paths and building params
    let config = SloopConfig::load(config_dir.path()).unwrap();
    let paths = detect_sloop_paths(&config.paths);
    unsafe { std::env::remove_var(SLOOP_DATA_DIR_ENV) };
    let paths = paths.unwrap();
    let providers = FileConfigurationProvider::new(config, paths.clone()).into_providers();
    let params = build_initialize_params(&providers).unwrap();

    // THEN: Overrides and detected paths both show up
    assert_eq!(params.storage_root, storage);
    assert_eq!(params.work_dir, Some(data.path().join("work")));
    assert_eq!(paths.log_dir, data.path().join("logs"));
    assert_eq!(params.sonar_cloud_connections[0].organization, "acme");
    assert_eq!(
        params.extra_enabled_languages_in_connected_mode,
        vec![models::Language::Kotlin]
    );
}

#[test]
fn given_unreadable_config_path_when_loaded_then_read_error() {
    // GIVEN: A directory where the config file should be
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join(CONFIG_FILE_NAME)).unwrap();

    // WHEN: Loading
    let result = SloopConfig::load(dir.path());

    // THEN: Read error rather than silent defaults
    assert!(matches!(
        result,
        Err(sloop_core::error::config::ConfigError::ReadError { .. })
    ));
}
