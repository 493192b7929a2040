use super::{SloopConfig, SloopPaths};
use crate::providers::{
    AnalysisFlagsProvider, ClientInfoProvider, ConfigurationProviders, EmbeddedPluginProvider,
    FolderProvider, LanguageProvider, RuleSettingsProvider, RuntimeLocator,
    ServerConnectionProvider, TelemetryProvider,
};

use models::{
    ClientConstantInfo, Language, ServerConnection, StandaloneRuleConfig,
    TelemetryConstantAttributes, TelemetryMigration,
};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Serves every provider role from a loaded [`SloopConfig`] and the detected paths.
#[derive(Debug, Clone)]
pub struct FileConfigurationProvider {
    config: SloopConfig,
    paths: SloopPaths,
}

impl FileConfigurationProvider {
    pub fn new(config: SloopConfig, paths: SloopPaths) -> Self {
        Self { config, paths }
    }

    pub fn into_providers(self) -> ConfigurationProviders {
        ConfigurationProviders::from_single(Arc::new(self))
    }
}

impl ClientInfoProvider for FileConfigurationProvider {
    fn client_info(&self) -> ClientConstantInfo {
        ClientConstantInfo {
            name: self.config.client.name.clone(),
            user_agent: self.config.client.user_agent.clone(),
        }
    }
}

impl LanguageProvider for FileConfigurationProvider {
    fn standalone_languages(&self) -> Vec<Language> {
        self.config.languages.standalone.clone()
    }

    fn extra_connected_languages(&self) -> Vec<Language> {
        self.config.languages.extra_connected.clone()
    }
}

impl FolderProvider for FileConfigurationProvider {
    fn storage_root(&self) -> PathBuf {
        self.paths.storage_root.clone()
    }

    fn work_dir(&self) -> Option<PathBuf> {
        Some(self.paths.work_dir.clone())
    }

    fn user_home(&self) -> PathBuf {
        self.paths.user_home.clone()
    }
}

impl ServerConnectionProvider for FileConfigurationProvider {
    fn connections(&self) -> Vec<ServerConnection> {
        self.config.server_connections()
    }
}

impl EmbeddedPluginProvider for FileConfigurationProvider {
    fn standalone_plugin_paths(&self) -> Vec<PathBuf> {
        self.config.plugins.standalone.clone()
    }

    fn connected_plugin_paths(&self) -> BTreeMap<String, PathBuf> {
        self.config.plugins.connected.clone()
    }

    fn disabled_plugin_keys_for_analysis(&self) -> Vec<String> {
        self.config.plugins.disabled_for_analysis.clone()
    }
}

impl RuleSettingsProvider for FileConfigurationProvider {
    fn standalone_rules(&self) -> BTreeMap<String, StandaloneRuleConfig> {
        self.config
            .rules
            .iter()
            .map(|(key, entry)| (key.clone(), StandaloneRuleConfig::from(entry)))
            .collect()
    }
}

impl TelemetryProvider for FileConfigurationProvider {
    fn is_enabled(&self) -> bool {
        self.config.telemetry.enabled
    }

    fn constant_attributes(&self) -> TelemetryConstantAttributes {
        let client = &self.config.client;
        TelemetryConstantAttributes {
            product_key: client.product_key.clone(),
            product_name: client.product_name.clone(),
            product_version: client.product_version.clone(),
            ide_version: client.ide_version.clone(),
            additional_attributes: self.config.telemetry.additional_attributes.clone(),
        }
    }

    fn migration(&self) -> Option<TelemetryMigration> {
        self.config
            .telemetry
            .migration
            .as_ref()
            .map(TelemetryMigration::from)
    }
}

impl RuntimeLocator for FileConfigurationProvider {
    fn node_js_path(&self) -> Option<PathBuf> {
        self.config.node.node_path.clone()
    }

    fn analysis_bridge_path(&self) -> Option<PathBuf> {
        self.config.node.bridge_path.clone()
    }
}

impl AnalysisFlagsProvider for FileConfigurationProvider {
    fn focus_on_new_code(&self) -> bool {
        self.config.flags.focus_on_new_code
    }

    fn automatic_analysis_enabled(&self) -> bool {
        self.config.flags.automatic_analysis
    }
}
