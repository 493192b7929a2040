//! Errors raised while locating, launching or talking to the backend process.

use common::ErrorLocation;

use std::error::Error as StdError;
use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Locate Error: {message} {location}")]
    Locate {
        message: String,
        location: ErrorLocation,
    },

    #[error("Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },

    #[error("Protocol Error: {message} {location}")]
    Protocol {
        message: String,
        location: ErrorLocation,
    },

    #[error("RPC Error {code}: {message} {location}")]
    Rpc {
        code: i64,
        message: String,
        location: ErrorLocation,
    },

    #[error("Connection Closed: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },
}

impl TransportError {
    #[track_caller]
    pub fn locate(message: impl Into<String>) -> Self {
        TransportError::Locate {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn protocol(message: impl Into<String>) -> Self {
        TransportError::Protocol {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        TransportError::Rpc {
            code,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn closed(message: impl Into<String>) -> Self {
        TransportError::Closed {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn timeout(message: impl Into<String>) -> Self {
        TransportError::Timeout {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// True when the error means the connection is gone rather than a single call failing.
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed { .. })
    }
}

impl From<IoError> for TransportError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        TransportError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        TransportError::Protocol {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
