use sloop_core::error::CoreError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the host from starting.
///
/// Backend crashes never surface here; the restart handler absorbs them.
#[derive(Debug, Error)]
pub enum HostError {
    /// Error from this binary (environment, filesystem, logger)
    #[error("Host Error: {message} {location}")]
    Host {
        message: String,
        location: ErrorLocation,
    },

    /// Error from sloop-core (config, path detection)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for HostError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        HostError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
