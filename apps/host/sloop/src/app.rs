//! Wiring of the sloop-core pieces into one running host.

use crate::error::HostError;
use crate::notifier::ConsoleRetryNotifier;
use crate::trackers::{ConnectionTracker, ScopeTracker};

use sloop_core::collaborators::RestartNotifier;
use sloop_core::config::{CONFIG_FILE_NAME, FileConfigurationProvider, SloopConfig, SloopPaths};
use sloop_core::connection_factory::RpcConnectionFactory;
use sloop_core::handler::SloopHandler;
use sloop_core::instance::SloopInstanceFactory;
use sloop_core::listeners::{ListenerAttacher, LogListener, RpcListener};
use sloop_core::services::ServiceRegistry;
use sloop_core::supervisor::InstanceSupervisor;
use sloop_core::thread_guard::ThreadGuard;
use sloop_core::transport::{BackendLauncher, BackendLocator, ProcessLauncher};

use common::ErrorLocation;

use std::env;
use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::runtime::Builder;

/// Overrides the config file location.
pub const SLOOP_CONFIG_ENV: &str = "SLOOP_CONFIG";

const CONFIG_DIR_NAME: &str = "sloop";

/// `SLOOP_CONFIG`, else `<platform config dir>/sloop/sloop.toml`.
#[track_caller]
pub fn config_file_path() -> Result<PathBuf, HostError> {
    if let Ok(path) = env::var(SLOOP_CONFIG_ENV)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or_else(|| HostError::Host {
            message: format!("Cannot determine config directory. Set {SLOOP_CONFIG_ENV}."),
            location: ErrorLocation::from(Location::caller()),
        })
}

/// How long runtime shutdown waits for blocking work, such as an unanswered retry prompt.
pub const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Runs `future` on a fresh multi-threaded runtime and returns its output.
///
/// Blocking tasks still running afterwards are abandoned once [`RUNTIME_SHUTDOWN_GRACE`] has
/// passed, so a stdin read the user never answers cannot keep the process alive.
#[track_caller]
pub fn block_on_host<F: Future>(future: F) -> Result<F::Output, HostError> {
    let location = ErrorLocation::from(Location::caller());
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| HostError::Host {
            message: format!("Failed to build async runtime: {e}"),
            location,
        })?;

    let output = runtime.block_on(future);
    debug!("Stopping async runtime");
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    Ok(output)
}

pub type HostSupervisor = InstanceSupervisor<SloopInstanceFactory>;

/// A fully wired host: registry, trackers, supervisor and restart handler.
pub struct SloopApp {
    handler: SloopHandler<HostSupervisor>,
    supervisor: Arc<HostSupervisor>,
    registry: Arc<ServiceRegistry>,
    scope_tracker: Arc<ScopeTracker>,
}

impl SloopApp {
    /// Wires the host to spawn the real backend executable.
    pub fn new(config: SloopConfig, paths: SloopPaths, thread_guard: ThreadGuard) -> Self {
        let launcher = ProcessLauncher::new(
            BackendLocator::new(config.backend.executable.clone()),
            config.backend.launch_options(Some(paths.work_dir.clone())),
        );
        Self::with_parts(
            config,
            paths,
            thread_guard,
            Box::new(launcher),
            Arc::new(ConsoleRetryNotifier::new()),
        )
    }

    pub fn with_parts(
        config: SloopConfig,
        paths: SloopPaths,
        thread_guard: ThreadGuard,
        launcher: Box<dyn BackendLauncher>,
        notifier: Arc<dyn RestartNotifier>,
    ) -> Self {
        let registry = Arc::new(ServiceRegistry::new());

        let connection_tracker = Arc::new(ConnectionTracker::new(
            Arc::clone(&registry),
            config.server_connections(),
        ));
        let scope_tracker = Arc::new(ScopeTracker::new(
            Arc::clone(&registry),
            Arc::clone(&connection_tracker),
            config.binding_configuration(),
        ));

        let listeners: Vec<Arc<dyn RpcListener>> =
            vec![Arc::new(LogListener), connection_tracker.clone()];
        let attacher = ListenerAttacher::new(listeners);
        let connection_factory = Arc::new(RpcConnectionFactory::new(
            launcher,
            Arc::clone(&registry),
            attacher,
        ));

        let max_starts = config.restart.max_starts_before_manual;
        let shutdown_timeout = config.backend.shutdown_timeout();
        let providers = FileConfigurationProvider::new(config, paths).into_providers();

        let instance_factory = SloopInstanceFactory::new(
            connection_factory,
            providers,
            scope_tracker.clone(),
            scope_tracker.clone(),
        )
        .with_thread_guard(thread_guard)
        .with_shutdown_timeout(shutdown_timeout);

        let supervisor = Arc::new(InstanceSupervisor::new(
            instance_factory,
            scope_tracker.clone(),
            connection_tracker,
            thread_guard,
        ));
        let handler = SloopHandler::new(Arc::clone(&supervisor), notifier, max_starts);

        Self {
            handler,
            supervisor,
            registry,
            scope_tracker,
        }
    }

    pub fn start(&self) {
        self.handler.enable_sloop();
    }

    pub async fn shutdown(&self) {
        info!("Shutting down sloop host");
        self.handler.dispose().await;
    }

    pub fn supervisor(&self) -> &Arc<HostSupervisor> {
        &self.supervisor
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn scope_tracker(&self) -> &Arc<ScopeTracker> {
        &self.scope_tracker
    }
}
