use super::{InstanceFactory, SloopInstance};
use crate::collaborators::{ActiveBindingTracker, ConfigScopeUpdater};
use crate::connection_factory::RpcConnectionFactory;
use crate::error::instance::InstanceError;
use crate::providers::ConfigurationProviders;
use crate::thread_guard::ThreadGuard;

use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Composition root for [`SloopInstance`]. Holds no per-instance state.
pub struct SloopInstanceFactory {
    connection_factory: Arc<RpcConnectionFactory>,
    providers: ConfigurationProviders,
    binding_tracker: Arc<dyn ActiveBindingTracker>,
    scope_updater: Arc<dyn ConfigScopeUpdater>,
    thread_guard: ThreadGuard,
    shutdown_timeout: Duration,
}

impl SloopInstanceFactory {
    pub fn new(
        connection_factory: Arc<RpcConnectionFactory>,
        providers: ConfigurationProviders,
        binding_tracker: Arc<dyn ActiveBindingTracker>,
        scope_updater: Arc<dyn ConfigScopeUpdater>,
    ) -> Self {
        Self {
            connection_factory,
            providers,
            binding_tracker,
            scope_updater,
            thread_guard: ThreadGuard::unbound(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    pub fn with_thread_guard(mut self, thread_guard: ThreadGuard) -> Self {
        self.thread_guard = thread_guard;
        self
    }

    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }
}

impl InstanceFactory for SloopInstanceFactory {
    type Instance = SloopInstance;

    fn create_instance(&self) -> Result<SloopInstance, InstanceError> {
        Ok(SloopInstance::new(
            Arc::clone(&self.connection_factory),
            self.providers.clone(),
            Arc::clone(&self.binding_tracker),
            Arc::clone(&self.scope_updater),
            self.thread_guard,
            self.shutdown_timeout,
        ))
    }
}
