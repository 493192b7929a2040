//! Typed service proxies over a [`Connection`] and the registry that caches them.

mod configuration;
mod connection;
mod lifecycle;
mod registry;

pub use configuration::ConfigurationService;
pub use connection::ConnectionService;
pub use lifecycle::LifecycleService;
pub use registry::ServiceRegistry;

use crate::error::transport::TransportError;
use crate::transport::Connection;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// A backend service interface that can be bound to a connection.
///
/// Only types implementing this trait can be requested from [`ServiceRegistry`].
pub trait RpcService: Send + Sync + 'static {
    /// Method prefix on the wire. Empty for root-level methods.
    const NAME: &'static str;

    fn bind(proxy: ServiceProxy) -> Self;
}

/// Untyped call surface shared by every service binding.
#[derive(Clone)]
pub struct ServiceProxy {
    connection: Arc<Connection>,
    service: &'static str,
}

impl ServiceProxy {
    pub(crate) fn new(connection: Arc<Connection>, service: &'static str) -> Self {
        Self {
            connection,
            service,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection.id()
    }

    pub fn is_alive(&self) -> bool {
        self.connection.is_alive()
    }

    fn method(&self, name: &str) -> String {
        if self.service.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.service)
        }
    }

    pub async fn call<P, R>(&self, name: &str, params: &P) -> Result<R, TransportError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let value = self.connection.request(&self.method(name), params).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn notify<P>(&self, name: &str, params: &P) -> Result<(), TransportError>
    where
        P: Serialize + ?Sized,
    {
        let params = serde_json::to_value(params)?;
        self.connection.notify(&self.method(name), params)
    }
}
