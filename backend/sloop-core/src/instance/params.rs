use crate::providers::ConfigurationProviders;

use models::{FeatureFlags, InitializeParams, InitializeParamsBuilder, ModelError};

/// Capabilities this host always advertises to the backend.
pub fn host_feature_flags(enable_telemetry: bool) -> FeatureFlags {
    FeatureFlags {
        should_manage_smart_notifications: true,
        are_taint_vulnerabilities_enabled: true,
        should_synchronize_project_branches: true,
        should_manage_local_server: false,
        enable_security_hotspots: true,
        should_manage_server_sent_events: true,
        enable_data_flow_bug_detection: false,
        should_manage_full_synchronization: true,
        enable_telemetry,
        can_open_fix_suggestion: true,
        enable_monitoring: false,
    }
}

/// Snapshot every provider into the handshake payload.
pub fn build_initialize_params(
    providers: &ConfigurationProviders,
) -> Result<InitializeParams, ModelError> {
    let client = providers.client.client_info();

    InitializeParamsBuilder::default()
        .with_client(client.name, client.user_agent)
        .with_feature_flags(host_feature_flags(providers.telemetry.is_enabled()))
        .with_storage_root(providers.folders.storage_root())
        .with_work_dir(providers.folders.work_dir())
        .with_user_home(providers.folders.user_home())
        .with_embedded_plugin_paths(providers.plugins.standalone_plugin_paths())
        .with_connected_plugin_paths(providers.plugins.connected_plugin_paths())
        .with_disabled_plugin_keys(providers.plugins.disabled_plugin_keys_for_analysis())
        .with_connections(providers.connections.connections())
        .with_rules(providers.rules.standalone_rules())
        .with_languages(
            providers.languages.standalone_languages(),
            providers.languages.extra_connected_languages(),
        )
        .with_node_js_path(providers.runtimes.node_js_path())
        .with_analysis_bridge_path(providers.runtimes.analysis_bridge_path())
        .with_telemetry(providers.telemetry.constant_attributes())
        .with_telemetry_migration(providers.telemetry.migration())
        .with_focus_on_new_code(providers.flags.focus_on_new_code())
        .with_automatic_analysis(providers.flags.automatic_analysis_enabled())
        .build()
}
