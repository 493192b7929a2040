use super::{RpcService, ServiceProxy};
use crate::error::transport::TransportError;

use models::InitializeParams;

use serde::de::IgnoredAny;
use serde_json::Value;

/// Root-level `initialize` / `shutdown` handshake.
pub struct LifecycleService {
    proxy: ServiceProxy,
}

impl RpcService for LifecycleService {
    const NAME: &'static str = "";

    fn bind(proxy: ServiceProxy) -> Self {
        Self { proxy }
    }
}

impl LifecycleService {
    pub async fn initialize(&self, params: &InitializeParams) -> Result<(), TransportError> {
        let _: IgnoredAny = self.proxy.call("initialize", params).await?;
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let _: IgnoredAny = self.proxy.call("shutdown", &Value::Null).await?;
        Ok(())
    }
}
