use crate::error::transport::TransportError;

use common::ErrorLocation;
use models::ModelError;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum InstanceError {
    #[error("UI Thread Error: {message} {location}")]
    OnUiThread {
        message: String,
        location: ErrorLocation,
    },

    #[error("Service Unavailable: {message} {location}")]
    ServiceUnavailable {
        message: String,
        location: ErrorLocation,
    },

    #[error("Handshake Error: {message} {location}")]
    Handshake {
        message: String,
        location: ErrorLocation,
    },

    #[error("Instance Disposed: {message} {location}")]
    Disposed {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Params(#[from] ModelError),
}

impl InstanceError {
    #[track_caller]
    pub fn on_ui_thread(operation: &str) -> Self {
        InstanceError::OnUiThread {
            message: format!("{operation} must not run on the UI thread"),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn service_unavailable(service: &str) -> Self {
        InstanceError::ServiceUnavailable {
            message: format!("'{service}' service is not available on the current connection"),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn handshake(error: &TransportError) -> Self {
        InstanceError::Handshake {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn disposed() -> Self {
        InstanceError::Disposed {
            message: "instance handle was already disposed".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
