//! Host-side state the backend must be told about after every (re)start.

use sloop_core::collaborators::{
    ActiveBindingTracker, AliveConnectionTracker, ConfigScopeTracker, ConfigScopeUpdater,
};
use sloop_core::listeners::RpcListener;
use sloop_core::services::{ConfigurationService, ConnectionService, ServiceRegistry};
use sloop_core::transport::ResponseError;

use models::{
    BindingConfiguration, ConfigurationScopeDto, ServerConnection, SonarCloudConnectionConfig,
    SonarQubeConnectionConfig,
};

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt};
use log::{debug, info, warn};
use serde_json::{Value, json};

/// Prefix of the environment variables holding per-connection tokens.
pub const TOKEN_ENV_PREFIX: &str = "SLOOP_TOKEN_";

/// `SLOOP_TOKEN_<ID>` with the id upper-cased and non-alphanumerics replaced by `_`.
pub fn token_env_var(connection_id: &str) -> String {
    let suffix: String = connection_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{TOKEN_ENV_PREFIX}{suffix}")
}

/// Keeps the backend's view of server connections in sync and answers credential requests.
pub struct ConnectionTracker {
    registry: Arc<ServiceRegistry>,
    connections: Vec<ServerConnection>,
    disposed: AtomicBool,
}

impl ConnectionTracker {
    pub fn new(registry: Arc<ServiceRegistry>, connections: Vec<ServerConnection>) -> Self {
        Self {
            registry,
            connections,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Sends the configured connections to the current backend.
    pub fn announce(&self) {
        if self.is_disposed() {
            return;
        }
        let Some(service) = self.registry.try_get_service::<ConnectionService>() else {
            debug!("No live backend to announce connections to");
            return;
        };

        let mut sonar_qube: Vec<SonarQubeConnectionConfig> = Vec::new();
        let mut sonar_cloud: Vec<SonarCloudConnectionConfig> = Vec::new();
        for connection in &self.connections {
            match connection {
                ServerConnection::SonarQube(config) => sonar_qube.push(config.clone()),
                ServerConnection::SonarCloud(config) => sonar_cloud.push(config.clone()),
            }
        }

        match service.did_update_connections(&sonar_qube, &sonar_cloud) {
            Ok(()) => info!(
                "Announced {} server connection(s) to the backend",
                self.connections.len()
            ),
            Err(e) => warn!("Failed to announce server connections: {e}"),
        }
    }

    fn credentials(&self, params: Value) -> Result<Value, ResponseError> {
        let connection_id = params
            .get("connectionId")
            .and_then(Value::as_str)
            .ok_or_else(|| ResponseError::invalid_params("connectionId is required"))?;

        if !self
            .connections
            .iter()
            .any(|connection| connection.connection_id() == connection_id)
        {
            return Err(ResponseError::invalid_params(format!(
                "Unknown connection: {connection_id}"
            )));
        }

        let token = env::var(token_env_var(connection_id)).ok();
        if token.is_none() {
            warn!(
                "No token for connection {connection_id}; set {}",
                token_env_var(connection_id)
            );
        }
        Ok(json!({ "token": token }))
    }
}

impl AliveConnectionTracker for ConnectionTracker {
    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            debug!("Connection tracker disposed");
        }
    }
}

impl RpcListener for ConnectionTracker {
    fn service(&self) -> &str {
        "connection"
    }

    fn on_notification(&self, method: &str, _params: Value) {
        debug!("Ignoring connection/{method} notification");
    }

    fn on_request(&self, method: &str, params: Value) -> Result<Value, ResponseError> {
        match method {
            "getCredentials" => self.credentials(params),
            _ => Err(ResponseError::method_not_found(method)),
        }
    }
}

/// Declares the active configuration scope to the backend and forgets it when the backend dies.
pub struct ScopeTracker {
    registry: Arc<ServiceRegistry>,
    connections: Arc<ConnectionTracker>,
    configuration: Option<BindingConfiguration>,
    declared: Mutex<Option<String>>,
    disposed: AtomicBool,
}

impl ScopeTracker {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        connections: Arc<ConnectionTracker>,
        configuration: Option<BindingConfiguration>,
    ) -> Self {
        Self {
            registry,
            connections,
            configuration,
            declared: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    fn declared(&self) -> MutexGuard<'_, Option<String>> {
        self.declared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scope id the current backend knows about, if any.
    pub fn declared_scope(&self) -> Option<String> {
        self.declared().clone()
    }

    fn apply(&self, configuration: &BindingConfiguration) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let Some(service) = self.registry.try_get_service::<ConfigurationService>() else {
            debug!("No live backend to declare scope {} to", configuration.scope_id);
            return;
        };

        let scope = ConfigurationScopeDto::from(configuration);
        let mut declared = self.declared();
        let result = match declared.as_deref() {
            Some(current) if current == scope.id => {
                service.did_update_binding(&scope.id, &scope.binding)
            }
            previous => {
                if let Some(previous) = previous
                    && let Err(e) = service.did_remove_configuration_scope(previous)
                {
                    warn!("Failed to remove scope {previous}: {e}");
                }
                service.did_add_configuration_scopes(std::slice::from_ref(&scope))
            }
        };

        match result {
            Ok(()) => {
                info!(
                    "Declared scope {} ({})",
                    scope.id,
                    if configuration.is_bound() { "bound" } else { "standalone" }
                );
                *declared = Some(scope.id);
            }
            Err(e) => warn!("Failed to declare scope {}: {e}", scope.id),
        }
    }
}

impl ActiveBindingTracker for ScopeTracker {
    fn current_configuration(&self) -> Option<BindingConfiguration> {
        self.configuration.clone()
    }

    fn initialize(&self) -> BoxFuture<'_, ()> {
        async move { self.connections.announce() }.boxed()
    }
}

impl ConfigScopeUpdater for ScopeTracker {
    fn set_current_configuration(&self, configuration: BindingConfiguration) -> BoxFuture<'_, ()> {
        async move { self.apply(&configuration) }.boxed()
    }
}

impl ConfigScopeTracker for ScopeTracker {
    fn reset(&self) {
        if let Some(scope) = self.declared().take() {
            debug!("Forgetting scope {scope}");
        }
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.declared().take();
        debug!("Scope tracker disposed");
    }
}
