use crate::error::transport::TransportError;
use crate::listeners::ListenerAttacher;
use crate::services::ServiceRegistry;
use crate::transport::{BackendLauncher, Connection};

use std::sync::Arc;

use log::info;

/// Opens one new backend connection per call and makes it the registry's current connection.
pub struct RpcConnectionFactory {
    launcher: Box<dyn BackendLauncher>,
    registry: Arc<ServiceRegistry>,
    attacher: ListenerAttacher,
}

impl RpcConnectionFactory {
    pub fn new(
        launcher: Box<dyn BackendLauncher>,
        registry: Arc<ServiceRegistry>,
        attacher: ListenerAttacher,
    ) -> Self {
        Self {
            launcher,
            registry,
            attacher,
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Locate and launch the backend with every listener attached, then register the
    /// connection as current.
    ///
    /// Launch failures are returned to the caller untouched; the registry is only reset once a
    /// connection exists.
    pub fn start_new_rpc_instance(&self) -> Result<Arc<Connection>, TransportError> {
        let connection = Arc::new(self.launcher.launch(&self.attacher)?);

        self.registry.reset(Some(Arc::clone(&connection)));

        info!(
            "Started RPC connection {} ({} listener(s))",
            connection.id(),
            self.attacher.len()
        );
        Ok(connection)
    }
}
