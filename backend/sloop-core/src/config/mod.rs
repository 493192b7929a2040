pub mod paths;
pub mod provider;

pub use paths::{PathSource, SloopPaths, detect_sloop_paths};
pub use provider::FileConfigurationProvider;

use crate::error::config::ConfigError;
use crate::transport::LaunchOptions;
use crate::{SLOOP_CLIENT_NAME, SLOOP_CLIENT_USER_AGENT};

use common::ErrorLocation;
use models::{
    BindingConfiguration, BoundProject, Language, SonarCloudConnectionConfig, SonarCloudRegion,
    SonarQubeConnectionConfig, ServerConnection, StandaloneRuleConfig, TelemetryMigration,
};

use std::collections::{BTreeMap, HashSet};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "sloop.toml";

// ============================================
// CONFIG SECTIONS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub executable: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            executable: None,
            args: Vec::new(),
            env: BTreeMap::new(),
            request_timeout_secs: default_request_timeout_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn launch_options(&self, working_dir: Option<PathBuf>) -> LaunchOptions {
        LaunchOptions {
            args: self.args.clone(),
            env: self.env.clone(),
            working_dir,
            request_timeout: self.request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_client_name")]
    pub name: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_product_key")]
    pub product_key: String,
    #[serde(default = "default_product_name")]
    pub product_name: String,
    #[serde(default = "default_product_version")]
    pub product_version: String,
    #[serde(default)]
    pub ide_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            user_agent: default_user_agent(),
            product_key: default_product_key(),
            product_name: default_product_name(),
            product_version: default_product_version(),
            ide_version: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    pub storage_root: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub user_home: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default)]
    pub standalone: Vec<PathBuf>,
    #[serde(default)]
    pub connected: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub disabled_for_analysis: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConnectionEntry {
    SonarQube {
        id: String,
        url: String,
        #[serde(default)]
        disable_notifications: bool,
    },
    SonarCloud {
        id: String,
        organization: String,
        #[serde(default)]
        region: SonarCloudRegion,
        #[serde(default)]
        disable_notifications: bool,
    },
}

impl ConnectionEntry {
    pub fn id(&self) -> &str {
        match self {
            ConnectionEntry::SonarQube { id, .. } | ConnectionEntry::SonarCloud { id, .. } => id,
        }
    }
}

impl From<&ConnectionEntry> for ServerConnection {
    fn from(entry: &ConnectionEntry) -> Self {
        match entry {
            ConnectionEntry::SonarQube {
                id,
                url,
                disable_notifications,
            } => ServerConnection::SonarQube(SonarQubeConnectionConfig {
                connection_id: id.clone(),
                server_url: url.clone(),
                disable_notification: *disable_notifications,
            }),
            ConnectionEntry::SonarCloud {
                id,
                organization,
                region,
                disable_notifications,
            } => ServerConnection::SonarCloud(SonarCloudConnectionConfig {
                connection_id: id.clone(),
                organization: organization.clone(),
                region: *region,
                disable_notification: *disable_notifications,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEntry {
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl From<&RuleEntry> for StandaloneRuleConfig {
    fn from(entry: &RuleEntry) -> Self {
        StandaloneRuleConfig {
            is_active: entry.active,
            param_value_by_key: entry.params.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagesConfig {
    #[serde(default = "default_standalone_languages")]
    pub standalone: Vec<Language>,
    #[serde(default)]
    pub extra_connected: Vec<Language>,
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            standalone: default_standalone_languages(),
            extra_connected: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_path: Option<PathBuf>,
    pub bridge_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationEntry {
    pub install_time: String,
    #[serde(default)]
    pub num_use_days: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl From<&MigrationEntry> for TelemetryMigration {
    fn from(entry: &MigrationEntry) -> Self {
        TelemetryMigration {
            install_time: entry.install_time.clone(),
            num_use_days: entry.num_use_days,
            is_enabled: entry.enabled,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub additional_attributes: BTreeMap<String, String>,
    pub migration: Option<MigrationEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagsConfig {
    #[serde(default)]
    pub focus_on_new_code: bool,
    #[serde(default = "default_true")]
    pub automatic_analysis: bool,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            focus_on_new_code: false,
            automatic_analysis: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    #[serde(default = "default_max_starts_before_manual")]
    pub max_starts_before_manual: u32,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_starts_before_manual: default_max_starts_before_manual(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingConfig {
    #[serde(default = "default_scope_id")]
    pub scope_id: String,
    #[serde(default = "default_scope_name")]
    pub scope_name: String,
    pub connection_id: Option<String>,
    pub project_key: Option<String>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            scope_id: default_scope_id(),
            scope_name: default_scope_name(),
            connection_id: None,
            project_key: None,
        }
    }
}

impl From<&BindingConfig> for BindingConfiguration {
    fn from(config: &BindingConfig) -> Self {
        match (&config.connection_id, &config.project_key) {
            (Some(connection_id), Some(project_key)) => BindingConfiguration::bound(
                config.scope_id.clone(),
                config.scope_name.clone(),
                BoundProject {
                    connection_id: connection_id.clone(),
                    project_key: project_key.clone(),
                },
            ),
            _ => BindingConfiguration::standalone(
                config.scope_id.clone(),
                config.scope_name.clone(),
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SloopConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
    #[serde(default)]
    pub rules: BTreeMap<String, RuleEntry>,
    #[serde(default)]
    pub languages: LanguagesConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub flags: FlagsConfig,
    #[serde(default)]
    pub restart: RestartConfig,
    pub binding: Option<BindingConfig>,
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_true() -> bool {
    true
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_shutdown_timeout_secs() -> u64 {
    5
}
fn default_client_name() -> String {
    SLOOP_CLIENT_NAME.to_string()
}
fn default_user_agent() -> String {
    SLOOP_CLIENT_USER_AGENT.to_string()
}
fn default_product_key() -> String {
    "sloop".to_string()
}
fn default_product_name() -> String {
    "Sloop Host".to_string()
}
fn default_product_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
fn default_standalone_languages() -> Vec<Language> {
    vec![
        Language::Js,
        Language::Ts,
        Language::Css,
        Language::Html,
        Language::Secrets,
    ]
}
fn default_max_starts_before_manual() -> u32 {
    3
}
fn default_scope_id() -> String {
    "default".to_string()
}
fn default_scope_name() -> String {
    "Default".to_string()
}

// ============================================
// IMPLEMENTATION
// ============================================

impl SloopConfig {
    /// Load config from `{config_dir}/sloop.toml`.
    ///
    /// # Returns
    ///
    /// Returns `Ok(SloopConfig)` if loaded successfully or defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is unreadable or invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        Self::load_file(&config_dir.join(CONFIG_FILE_NAME))
    }

    pub fn load_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            warn!("Failed to read config file: {e}");
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.to_path_buf(),
                source: e,
            }
        })?;

        let config = Self::parse(&contents).map_err(|e| match e {
            ConfigError::ParseError {
                location, reason, ..
            } => ConfigError::ParseError {
                location,
                path: config_path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: SloopConfig = toml::from_str(contents).map_err(|e| {
            warn!("Failed to parse config TOML: {e}");
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: PathBuf::new(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.restart.max_starts_before_manual == 0 {
            return Err(ConfigError::validation(
                "restart.max_starts_before_manual must be at least 1",
            ));
        }

        if self.client.name.trim().is_empty() {
            return Err(ConfigError::validation("client.name cannot be empty"));
        }

        if self.backend.request_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "backend.request_timeout_secs must be greater than 0",
            ));
        }

        if self.backend.shutdown_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "backend.shutdown_timeout_secs must be greater than 0",
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.connections {
            if !seen.insert(entry.id()) {
                return Err(ConfigError::validation(format!(
                    "Duplicate connection id: {}",
                    entry.id()
                )));
            }

            if let ConnectionEntry::SonarQube { url, .. } = entry
                && !url.starts_with("http://")
                && !url.starts_with("https://")
            {
                return Err(ConfigError::validation(format!(
                    "Invalid URL format: {url}"
                )));
            }
        }

        Ok(())
    }

    pub fn server_connections(&self) -> Vec<ServerConnection> {
        self.connections.iter().map(ServerConnection::from).collect()
    }

    pub fn binding_configuration(&self) -> Option<BindingConfiguration> {
        self.binding.as_ref().map(BindingConfiguration::from)
    }
}
