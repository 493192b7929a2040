use crate::{
    InitializeParamsBuilder, Language, ModelError, SonarCloudConnectionConfig, SonarCloudRegion,
    SonarQubeConnectionConfig, ServerConnection, TelemetryMigration,
};

fn minimal_builder() -> InitializeParamsBuilder {
    InitializeParamsBuilder::default()
        .with_client("sloop-host", "sloop-host/1.0")
        .with_storage_root("/tmp/sloop/storage")
        .with_user_home("/home/user/.sloop")
}

fn sonarqube(id: &str, url: &str) -> ServerConnection {
    ServerConnection::SonarQube(SonarQubeConnectionConfig {
        connection_id: id.to_string(),
        server_url: url.to_string(),
        disable_notification: false,
    })
}

fn sonarcloud(id: &str, organization: &str) -> ServerConnection {
    ServerConnection::SonarCloud(SonarCloudConnectionConfig {
        connection_id: id.to_string(),
        organization: organization.to_string(),
        region: SonarCloudRegion::Eu,
        disable_notification: true,
    })
}

fn validation_message(result: Result<crate::InitializeParams, ModelError>) -> String {
    match result {
        Err(ModelError::Validation { message, .. }) => message,
        Ok(_) => panic!("Expected validation error, build succeeded"),
    }
}

/// **VALUE**: Verifies that the minimal set of required fields produces a payload.
///
/// **WHY THIS MATTERS**: The handshake cannot be sent at all if a host that only
/// configures paths and identity fails to build parameters.
#[test]
fn given_required_fields_when_building_then_succeeds_with_empty_collections() {
    // GIVEN: Only client identity and required directories
    let builder = minimal_builder();

    // WHEN: Building
    let params = builder.build().expect("minimal params should build");

    // THEN: Optional parts are empty/absent
    assert_eq!(params.client_constant_info.name, "sloop-host");
    assert!(params.sonar_qube_connections.is_empty());
    assert!(params.sonar_cloud_connections.is_empty());
    assert!(params.language_specific_requirements.is_none());
    assert!(params.work_dir.is_none());
}

/// **VALUE**: Verifies that builder validation rejects a missing storage root.
///
/// **BUG THIS CATCHES**: Would catch if the storage root became optional; the backend
/// refuses to start without a place to keep its local storage.
#[test]
fn given_missing_storage_root_when_building_then_returns_validation_error() {
    // GIVEN: Builder without storage root
    let builder = InitializeParamsBuilder::default()
        .with_client("sloop-host", "ua")
        .with_user_home("/home/user/.sloop");

    // WHEN/THEN
    assert_eq!(validation_message(builder.build()), "Storage root is required");
}

#[test]
fn given_blank_client_name_when_building_then_returns_validation_error() {
    let builder = InitializeParamsBuilder::default()
        .with_client("   ", "ua")
        .with_storage_root("/s")
        .with_user_home("/h");

    assert_eq!(validation_message(builder.build()), "Client name cannot be empty");
}

/// **VALUE**: Verifies that mixed server connections are split by flavour.
///
/// **WHY THIS MATTERS**: The backend keys connections by id in two separate lists;
/// putting a SonarCloud entry in the SonarQube list makes it unusable.
#[test]
fn given_mixed_connections_when_building_then_splits_sonarqube_and_sonarcloud() {
    // GIVEN: Two SonarQube and one SonarCloud connection
    let builder = minimal_builder().with_connections(vec![
        sonarqube("sq-1", "https://sq.example.com"),
        sonarcloud("sc-1", "acme"),
        sonarqube("sq-2", "http://localhost:9000"),
    ]);

    // WHEN: Building
    let params = builder.build().unwrap();

    // THEN: Each list holds only its own flavour, in the given order
    let sq_ids: Vec<_> = params
        .sonar_qube_connections
        .iter()
        .map(|c| c.connection_id.as_str())
        .collect();
    assert_eq!(sq_ids, vec!["sq-1", "sq-2"]);
    assert_eq!(params.sonar_cloud_connections.len(), 1);
    assert_eq!(params.sonar_cloud_connections[0].organization, "acme");
}

/// **VALUE**: Verifies that connection ids must be unique across both flavours.
///
/// **BUG THIS CATCHES**: Would catch if uniqueness were checked per list only, letting
/// `sq` and `sc` entries collide on the same id.
#[test]
fn given_duplicate_connection_id_across_flavours_when_building_then_returns_validation_error() {
    // GIVEN: A SonarQube and a SonarCloud connection sharing an id
    let builder = minimal_builder().with_connections(vec![
        sonarqube("shared", "https://sq.example.com"),
        sonarcloud("shared", "acme"),
    ]);

    // WHEN/THEN
    assert_eq!(
        validation_message(builder.build()),
        "Duplicate connection id: shared"
    );
}

#[test]
fn given_non_http_server_url_when_building_then_returns_validation_error() {
    let builder = minimal_builder().with_connections(vec![sonarqube("sq", "ftp://sq.example.com")]);

    let message = validation_message(builder.build());
    assert!(message.starts_with("Invalid server URL format:"));
    assert!(message.contains("ftp://"));
}

/// **VALUE**: Verifies language list normalization.
///
/// **WHY THIS MATTERS**: Listing a language both as standalone and as a connected-mode
/// extra would make the backend treat it as connected-only in some versions.
#[test]
fn given_overlapping_language_lists_when_building_then_extras_exclude_standalone() {
    // GIVEN: Duplicated standalone entries and an overlapping extra
    let builder = minimal_builder().with_languages(
        vec![Language::Js, Language::Ts, Language::Js],
        vec![Language::Ts, Language::Tsql, Language::Tsql],
    );

    // WHEN: Building
    let params = builder.build().unwrap();

    // THEN: Standalone keeps first-seen order without duplicates; extras drop TS
    assert_eq!(
        params.enabled_languages_in_standalone_mode,
        vec![Language::Js, Language::Ts]
    );
    assert_eq!(
        params.extra_enabled_languages_in_connected_mode,
        vec![Language::Tsql]
    );
}

#[test]
fn given_node_path_when_building_then_language_requirements_present() {
    let params = minimal_builder()
        .with_node_js_path(Some("/usr/bin/node".into()))
        .build()
        .unwrap();

    let requirements = params
        .language_specific_requirements
        .expect("requirements should be set when a node path is given");
    assert_eq!(
        requirements.client_node_js_path.as_deref(),
        Some(std::path::Path::new("/usr/bin/node"))
    );
    assert!(requirements.analysis_bridge_path.is_none());
}

#[test]
fn given_migration_without_install_time_when_building_then_returns_validation_error() {
    let builder = minimal_builder().with_telemetry_migration(Some(TelemetryMigration {
        install_time: String::new(),
        num_use_days: 3,
        is_enabled: true,
    }));

    assert_eq!(
        validation_message(builder.build()),
        "Telemetry migration install time cannot be empty"
    );
}

/// **VALUE**: Verifies the wire shape of the handshake payload.
///
/// **WHY THIS MATTERS**: The backend deserializes camelCase keys and upper-case language
/// keys; a serde attribute regression silently drops the whole configuration.
#[test]
fn given_params_when_serialized_then_uses_camel_case_and_language_keys() {
    // GIVEN: Params with flags and languages set
    let params = minimal_builder()
        .with_languages(vec![Language::Cpp, Language::Secrets], vec![])
        .with_focus_on_new_code(true)
        .build()
        .unwrap();

    // WHEN: Serializing to JSON
    let json = serde_json::to_value(&params).unwrap();

    // THEN: Field names and enum values use the wire spelling
    assert_eq!(json["isFocusOnNewCode"], true);
    assert_eq!(json["clientConstantInfo"]["userAgent"], "sloop-host/1.0");
    assert_eq!(
        json["enabledLanguagesInStandaloneMode"],
        serde_json::json!(["CPP", "SECRETS"])
    );
    assert!(json.get("storageRoot").is_some());
}
