pub mod config;
pub mod instance;
pub mod paths;
pub mod supervisor;
pub mod transport;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Transport(#[from] transport::TransportError),

    #[error(transparent)]
    Instance(#[from] instance::InstanceError),

    #[error(transparent)]
    Supervisor(#[from] supervisor::SupervisorError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Paths(#[from] paths::PathError),

    #[error(transparent)]
    Model(#[from] models::ModelError),
}
