use super::Instance;
use super::params::build_initialize_params;
use crate::collaborators::{ActiveBindingTracker, ConfigScopeUpdater};
use crate::connection_factory::RpcConnectionFactory;
use crate::error::instance::InstanceError;
use crate::providers::ConfigurationProviders;
use crate::services::LifecycleService;
use crate::thread_guard::ThreadGuard;
use crate::transport::Connection;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::time::timeout;
use uuid::Uuid;

/// One backend session: its connection, its handshake and its teardown.
pub struct SloopInstance {
    connection_factory: Arc<RpcConnectionFactory>,
    providers: ConfigurationProviders,
    binding_tracker: Arc<dyn ActiveBindingTracker>,
    scope_updater: Arc<dyn ConfigScopeUpdater>,
    thread_guard: ThreadGuard,
    shutdown_timeout: Duration,
    connection: Mutex<Option<Arc<Connection>>>,
    dead: Arc<watch::Sender<bool>>,
    disposed: AtomicBool,
}

impl SloopInstance {
    pub(crate) fn new(
        connection_factory: Arc<RpcConnectionFactory>,
        providers: ConfigurationProviders,
        binding_tracker: Arc<dyn ActiveBindingTracker>,
        scope_updater: Arc<dyn ConfigScopeUpdater>,
        thread_guard: ThreadGuard,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            connection_factory,
            providers,
            binding_tracker,
            scope_updater,
            thread_guard,
            shutdown_timeout,
            connection: Mutex::new(None),
            dead: Arc::new(watch::Sender::new(false)),
            disposed: AtomicBool::new(false),
        }
    }

    fn connection_slot(&self) -> MutexGuard<'_, Option<Arc<Connection>>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connection_id(&self) -> Option<Uuid> {
        self.connection_slot().as_ref().map(|c| c.id())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Makes `connection` this instance's connection. False when `dispose` already ran, in
    /// which case the caller owns the connection's teardown.
    fn adopt(&self, connection: &Arc<Connection>) -> bool {
        let mut slot = self.connection_slot();
        if self.is_disposed() {
            return false;
        }
        *slot = Some(Arc::clone(connection));

        let dead = Arc::clone(&self.dead);
        let watched = Arc::clone(connection);
        tokio::spawn(async move {
            watched.closed().await;
            debug!("Connection {} is gone", watched.id());
            dead.send_replace(true);
        });
        true
    }

    /// Tears down a connection opened after `dispose` and unregisters it.
    async fn discard(&self, connection: Arc<Connection>) {
        warn!(
            "Instance disposed while connection {} was opening, closing it",
            connection.id()
        );
        connection.dispose().await;

        let registry = self.connection_factory.registry();
        if registry.current_connection_id() == Some(connection.id()) {
            registry.reset(None);
        }
    }
}

impl Instance for SloopInstance {
    async fn initialize(&self) -> Result<(), InstanceError> {
        if self.thread_guard.is_on_ui_thread() {
            return Err(InstanceError::on_ui_thread("initialize"));
        }
        if self.is_disposed() {
            return Err(InstanceError::disposed());
        }

        let connection = self.connection_factory.start_new_rpc_instance()?;
        if !self.adopt(&connection) {
            self.discard(connection).await;
            return Err(InstanceError::disposed());
        }

        let params = build_initialize_params(&self.providers)?;

        let lifecycle = self
            .connection_factory
            .registry()
            .try_get_service::<LifecycleService>()
            .ok_or_else(|| InstanceError::service_unavailable("lifecycle"))?;
        lifecycle
            .initialize(&params)
            .await
            .map_err(|e| InstanceError::handshake(&e))?;
        info!("Handshake completed on connection {}", connection.id());

        self.binding_tracker.initialize().await;
        if let Some(configuration) = self.binding_tracker.current_configuration() {
            self.scope_updater
                .set_current_configuration(configuration)
                .await;
        }

        Ok(())
    }

    async fn wait_for_shutdown(&self) {
        let mut dead = self.dead.subscribe();
        let _ = dead.wait_for(|dead| *dead).await;
    }

    async fn dispose(&self) {
        let connection = {
            let mut slot = self.connection_slot();
            if self.disposed.swap(true, Ordering::SeqCst) {
                return;
            }
            slot.take()
        };
        if let Some(connection) = connection {
            let task = tokio::spawn(shut_down(connection, self.shutdown_timeout));
            if let Err(e) = task.await {
                warn!("Backend shutdown task failed: {e}");
            }
        }

        self.dead.send_replace(true);
    }
}

/// Ask the backend to stop, ignoring any failure, then tear the connection down regardless.
async fn shut_down(connection: Arc<Connection>, shutdown_timeout: Duration) {
    if connection.is_alive() {
        let lifecycle = connection.create_service::<LifecycleService>();
        match timeout(shutdown_timeout, lifecycle.shutdown()).await {
            Ok(Ok(())) => debug!("Backend acknowledged shutdown on {}", connection.id()),
            Ok(Err(e)) => debug!("Ignoring shutdown failure on {}: {e}", connection.id()),
            Err(_) => debug!(
                "Backend on {} did not acknowledge shutdown within {shutdown_timeout:?}",
                connection.id()
            ),
        }
    }

    connection.dispose().await;
}
