use super::{RpcService, ServiceProxy};
use crate::error::transport::TransportError;

use models::{SonarCloudConnectionConfig, SonarQubeConnectionConfig};

use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateConnectionsParams<'a> {
    sonar_qube_connections: &'a [SonarQubeConnectionConfig],
    sonar_cloud_connections: &'a [SonarCloudConnectionConfig],
}

/// Server connection announcements (`connection/*`).
pub struct ConnectionService {
    proxy: ServiceProxy,
}

impl RpcService for ConnectionService {
    const NAME: &'static str = "connection";

    fn bind(proxy: ServiceProxy) -> Self {
        Self { proxy }
    }
}

impl ConnectionService {
    pub fn did_update_connections(
        &self,
        sonar_qube_connections: &[SonarQubeConnectionConfig],
        sonar_cloud_connections: &[SonarCloudConnectionConfig],
    ) -> Result<(), TransportError> {
        self.proxy.notify(
            "didUpdateConnections",
            &UpdateConnectionsParams {
                sonar_qube_connections,
                sonar_cloud_connections,
            },
        )
    }
}
