//! Read-only configuration sources queried when building the handshake payload.

use models::{
    ClientConstantInfo, Language, ServerConnection, StandaloneRuleConfig,
    TelemetryConstantAttributes, TelemetryMigration,
};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

pub trait ClientInfoProvider: Send + Sync {
    fn client_info(&self) -> ClientConstantInfo;
}

pub trait LanguageProvider: Send + Sync {
    fn standalone_languages(&self) -> Vec<Language>;
    fn extra_connected_languages(&self) -> Vec<Language>;
}

pub trait FolderProvider: Send + Sync {
    fn storage_root(&self) -> PathBuf;
    fn work_dir(&self) -> Option<PathBuf>;
    fn user_home(&self) -> PathBuf;
}

pub trait ServerConnectionProvider: Send + Sync {
    fn connections(&self) -> Vec<ServerConnection>;
}

pub trait EmbeddedPluginProvider: Send + Sync {
    fn standalone_plugin_paths(&self) -> Vec<PathBuf>;
    fn connected_plugin_paths(&self) -> BTreeMap<String, PathBuf>;
    fn disabled_plugin_keys_for_analysis(&self) -> Vec<String>;
}

pub trait RuleSettingsProvider: Send + Sync {
    fn standalone_rules(&self) -> BTreeMap<String, StandaloneRuleConfig>;
}

pub trait TelemetryProvider: Send + Sync {
    fn is_enabled(&self) -> bool;
    fn constant_attributes(&self) -> TelemetryConstantAttributes;
    fn migration(&self) -> Option<TelemetryMigration>;
}

pub trait RuntimeLocator: Send + Sync {
    fn node_js_path(&self) -> Option<PathBuf>;
    fn analysis_bridge_path(&self) -> Option<PathBuf>;
}

pub trait AnalysisFlagsProvider: Send + Sync {
    fn focus_on_new_code(&self) -> bool;
    fn automatic_analysis_enabled(&self) -> bool;
}

/// Every provider an instance needs, each independently substitutable.
#[derive(Clone)]
pub struct ConfigurationProviders {
    pub client: Arc<dyn ClientInfoProvider>,
    pub languages: Arc<dyn LanguageProvider>,
    pub folders: Arc<dyn FolderProvider>,
    pub connections: Arc<dyn ServerConnectionProvider>,
    pub plugins: Arc<dyn EmbeddedPluginProvider>,
    pub rules: Arc<dyn RuleSettingsProvider>,
    pub telemetry: Arc<dyn TelemetryProvider>,
    pub runtimes: Arc<dyn RuntimeLocator>,
    pub flags: Arc<dyn AnalysisFlagsProvider>,
}

impl ConfigurationProviders {
    /// Uses one object for every provider role.
    pub fn from_single<P>(provider: Arc<P>) -> Self
    where
        P: ClientInfoProvider
            + LanguageProvider
            + FolderProvider
            + ServerConnectionProvider
            + EmbeddedPluginProvider
            + RuleSettingsProvider
            + TelemetryProvider
            + RuntimeLocator
            + AnalysisFlagsProvider
            + 'static,
    {
        Self {
            client: provider.clone(),
            languages: provider.clone(),
            folders: provider.clone(),
            connections: provider.clone(),
            plugins: provider.clone(),
            rules: provider.clone(),
            telemetry: provider.clone(),
            runtimes: provider.clone(),
            flags: provider,
        }
    }
}
