//! The handshake payload sent with the backend's `initialize` request.
//!
//! [`InitializeParams`] is assembled once per instance start from the host's
//! configuration providers and never mutated afterwards. Use
//! [`InitializeParamsBuilder`](builder::InitializeParamsBuilder) to construct
//! a validated value.

pub mod builder;

use crate::connection::{SonarCloudConnectionConfig, SonarQubeConnectionConfig};
use crate::language::Language;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identity of the embedding host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConstantInfo {
    pub name: String,
    pub user_agent: String,
}

/// Capabilities the host asks the backend to enable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub should_manage_smart_notifications: bool,
    pub are_taint_vulnerabilities_enabled: bool,
    pub should_synchronize_project_branches: bool,
    pub should_manage_local_server: bool,
    pub enable_security_hotspots: bool,
    pub should_manage_server_sent_events: bool,
    pub enable_data_flow_bug_detection: bool,
    pub should_manage_full_synchronization: bool,
    pub enable_telemetry: bool,
    pub can_open_fix_suggestion: bool,
    pub enable_monitoring: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StandaloneRuleConfig {
    pub is_active: bool,
    pub param_value_by_key: BTreeMap<String, String>,
}

/// Optional runtime locations some analyzers need.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LanguageSpecificRequirements {
    pub client_node_js_path: Option<PathBuf>,
    pub analysis_bridge_path: Option<PathBuf>,
}

impl LanguageSpecificRequirements {
    pub fn is_empty(&self) -> bool {
        self.client_node_js_path.is_none() && self.analysis_bridge_path.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConstantAttributes {
    pub product_key: String,
    pub product_name: String,
    pub product_version: String,
    pub ide_version: String,
    pub additional_attributes: BTreeMap<String, String>,
}

/// Usage counters carried over from a host-side telemetry store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMigration {
    pub install_time: String,
    pub num_use_days: u32,
    pub is_enabled: bool,
}

/// Immutable configuration snapshot handed to the backend at handshake time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub client_constant_info: ClientConstantInfo,
    pub feature_flags: FeatureFlags,
    pub storage_root: PathBuf,
    pub work_dir: Option<PathBuf>,
    pub user_home: PathBuf,
    pub embedded_plugin_paths: Vec<PathBuf>,
    pub connected_mode_embedded_plugin_path_by_key: BTreeMap<String, PathBuf>,
    pub disabled_plugin_keys_for_analysis: Vec<String>,
    pub sonar_qube_connections: Vec<SonarQubeConnectionConfig>,
    pub sonar_cloud_connections: Vec<SonarCloudConnectionConfig>,
    pub standalone_rule_config_by_key: BTreeMap<String, StandaloneRuleConfig>,
    pub enabled_languages_in_standalone_mode: Vec<Language>,
    pub extra_enabled_languages_in_connected_mode: Vec<Language>,
    pub language_specific_requirements: Option<LanguageSpecificRequirements>,
    pub telemetry_constant_attributes: TelemetryConstantAttributes,
    pub telemetry_migration: Option<TelemetryMigration>,
    pub is_focus_on_new_code: bool,
    pub automatic_analysis_enabled: bool,
}
