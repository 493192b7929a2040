use crate::connection::ServerConnection;
use crate::error::model_error::ModelError;
use crate::initialize_params::{
    ClientConstantInfo, FeatureFlags, InitializeParams, LanguageSpecificRequirements,
    StandaloneRuleConfig, TelemetryConstantAttributes, TelemetryMigration,
};
use crate::language::Language;

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Builder for creating validated InitializeParams instances.
///
/// Server connections are supplied as one list and split by flavour on
/// [`build`](Self::build); language lists are de-duplicated, and languages
/// already enabled in standalone mode are dropped from the connected-mode
/// extras.
#[derive(Debug, Default)]
pub struct InitializeParamsBuilder {
    client: Option<ClientConstantInfo>,
    feature_flags: FeatureFlags,
    storage_root: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    user_home: Option<PathBuf>,
    embedded_plugin_paths: Vec<PathBuf>,
    connected_plugin_paths: BTreeMap<String, PathBuf>,
    disabled_plugin_keys: Vec<String>,
    connections: Vec<ServerConnection>,
    rules: BTreeMap<String, StandaloneRuleConfig>,
    standalone_languages: Vec<Language>,
    extra_connected_languages: Vec<Language>,
    requirements: LanguageSpecificRequirements,
    telemetry: TelemetryConstantAttributes,
    telemetry_migration: Option<TelemetryMigration>,
    focus_on_new_code: bool,
    automatic_analysis: bool,
}

impl InitializeParamsBuilder {
    pub fn with_client(mut self, name: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.client = Some(ClientConstantInfo {
            name: name.into(),
            user_agent: user_agent.into(),
        });
        self
    }

    pub fn with_feature_flags(mut self, flags: FeatureFlags) -> Self {
        self.feature_flags = flags;
        self
    }

    pub fn with_storage_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_root = Some(path.into());
        self
    }

    pub fn with_work_dir(mut self, path: Option<PathBuf>) -> Self {
        self.work_dir = path;
        self
    }

    pub fn with_user_home(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_home = Some(path.into());
        self
    }

    pub fn with_embedded_plugin_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.embedded_plugin_paths = paths;
        self
    }

    pub fn with_connected_plugin_paths(mut self, paths: BTreeMap<String, PathBuf>) -> Self {
        self.connected_plugin_paths = paths;
        self
    }

    pub fn with_disabled_plugin_keys(mut self, keys: Vec<String>) -> Self {
        self.disabled_plugin_keys = keys;
        self
    }

    pub fn with_connections(mut self, connections: Vec<ServerConnection>) -> Self {
        self.connections = connections;
        self
    }

    pub fn with_rules(mut self, rules: BTreeMap<String, StandaloneRuleConfig>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_languages(mut self, standalone: Vec<Language>, extra_connected: Vec<Language>) -> Self {
        self.standalone_languages = standalone;
        self.extra_connected_languages = extra_connected;
        self
    }

    pub fn with_node_js_path(mut self, path: Option<PathBuf>) -> Self {
        self.requirements.client_node_js_path = path;
        self
    }

    pub fn with_analysis_bridge_path(mut self, path: Option<PathBuf>) -> Self {
        self.requirements.analysis_bridge_path = path;
        self
    }

    pub fn with_telemetry(mut self, attributes: TelemetryConstantAttributes) -> Self {
        self.telemetry = attributes;
        self
    }

    pub fn with_telemetry_migration(mut self, migration: Option<TelemetryMigration>) -> Self {
        self.telemetry_migration = migration;
        self
    }

    pub fn with_focus_on_new_code(mut self, enabled: bool) -> Self {
        self.focus_on_new_code = enabled;
        self
    }

    pub fn with_automatic_analysis(mut self, enabled: bool) -> Self {
        self.automatic_analysis = enabled;
        self
    }

    /// Build the InitializeParams with validation.
    #[track_caller]
    pub fn build(self) -> Result<InitializeParams, ModelError> {
        let client = self
            .client
            .ok_or_else(|| ModelError::validation("Client identity is required"))?;

        if client.name.trim().is_empty() {
            return Err(ModelError::validation("Client name cannot be empty"));
        }

        let storage_root = self
            .storage_root
            .ok_or_else(|| ModelError::validation("Storage root is required"))?;

        let user_home = self
            .user_home
            .ok_or_else(|| ModelError::validation("User home is required"))?;

        if let Some(migration) = &self.telemetry_migration
            && migration.install_time.is_empty()
        {
            return Err(ModelError::validation(
                "Telemetry migration install time cannot be empty",
            ));
        }

        let mut seen_ids = HashSet::new();
        let mut sonar_qube_connections = Vec::new();
        let mut sonar_cloud_connections = Vec::new();

        for connection in self.connections {
            let id = connection.connection_id();

            if id.is_empty() {
                return Err(ModelError::validation("Connection id cannot be empty"));
            }

            if !seen_ids.insert(id.to_string()) {
                return Err(ModelError::validation(format!(
                    "Duplicate connection id: {id}"
                )));
            }

            match connection {
                ServerConnection::SonarQube(sq) => {
                    if !sq.server_url.starts_with("http://")
                        && !sq.server_url.starts_with("https://")
                    {
                        return Err(ModelError::validation(format!(
                            "Invalid server URL format: {}",
                            sq.server_url
                        )));
                    }
                    sonar_qube_connections.push(sq);
                }
                ServerConnection::SonarCloud(sc) => {
                    if sc.organization.is_empty() {
                        return Err(ModelError::validation(format!(
                            "SonarCloud connection '{}' has no organization",
                            sc.connection_id
                        )));
                    }
                    sonar_cloud_connections.push(sc);
                }
            }
        }

        let enabled_languages_in_standalone_mode = dedup(self.standalone_languages);
        let extra_enabled_languages_in_connected_mode = dedup(self.extra_connected_languages)
            .into_iter()
            .filter(|language| !enabled_languages_in_standalone_mode.contains(language))
            .collect();

        let language_specific_requirements =
            (!self.requirements.is_empty()).then_some(self.requirements);

        Ok(InitializeParams {
            client_constant_info: client,
            feature_flags: self.feature_flags,
            storage_root,
            work_dir: self.work_dir,
            user_home,
            embedded_plugin_paths: self.embedded_plugin_paths,
            connected_mode_embedded_plugin_path_by_key: self.connected_plugin_paths,
            disabled_plugin_keys_for_analysis: self.disabled_plugin_keys,
            sonar_qube_connections,
            sonar_cloud_connections,
            standalone_rule_config_by_key: self.rules,
            enabled_languages_in_standalone_mode,
            extra_enabled_languages_in_connected_mode,
            language_specific_requirements,
            telemetry_constant_attributes: self.telemetry,
            telemetry_migration: self.telemetry_migration,
            is_focus_on_new_code: self.focus_on_new_code,
            automatic_analysis_enabled: self.automatic_analysis,
        })
    }
}

fn dedup(languages: Vec<Language>) -> Vec<Language> {
    let mut seen = HashSet::new();
    languages
        .into_iter()
        .filter(|language| seen.insert(*language))
        .collect()
}
