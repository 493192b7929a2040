use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SonarQubeConnectionConfig {
    pub connection_id: String,
    pub server_url: String,
    pub disable_notification: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SonarCloudRegion {
    #[default]
    Eu,
    Us,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SonarCloudConnectionConfig {
    pub connection_id: String,
    pub organization: String,
    pub region: SonarCloudRegion,
    pub disable_notification: bool,
}

/// A server connection known to the host, before it is split by flavour for
/// the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerConnection {
    SonarQube(SonarQubeConnectionConfig),
    SonarCloud(SonarCloudConnectionConfig),
}

impl ServerConnection {
    pub fn connection_id(&self) -> &str {
        match self {
            ServerConnection::SonarQube(c) => &c.connection_id,
            ServerConnection::SonarCloud(c) => &c.connection_id,
        }
    }
}
