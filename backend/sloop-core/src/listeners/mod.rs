//! Handlers for backend-initiated traffic and the attacher that wires them onto connections.

mod log_listener;

pub use log_listener::{BACKEND_LOG_TARGET, LogListener};

use crate::transport::ResponseError;

use std::sync::Arc;

use serde_json::Value;

/// Receives notifications and requests the backend sends for one service.
///
/// Inbound methods are routed on the part before the `/`; `method` is the part after it.
pub trait RpcListener: Send + Sync {
    fn service(&self) -> &str;

    fn on_notification(&self, method: &str, params: Value);

    fn on_request(&self, method: &str, params: Value) -> Result<Value, ResponseError> {
        let _ = params;
        Err(ResponseError::method_not_found(method))
    }
}

/// Fixed set of listeners attached to every connection the factory opens.
#[derive(Clone, Default)]
pub struct ListenerAttacher {
    listeners: Vec<Arc<dyn RpcListener>>,
}

impl ListenerAttacher {
    pub fn new(listeners: Vec<Arc<dyn RpcListener>>) -> Self {
        Self { listeners }
    }

    /// Listeners every new connection starts with.
    pub fn listeners(&self) -> &[Arc<dyn RpcListener>] {
        &self.listeners
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
