use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Programming errors surfaced by the supervisor. Backend failures are never reported here;
/// they are logged and turn into an ordinary instance death.
#[derive(Debug, ThisError)]
pub enum SupervisorError {
    #[error("Already Running Error: {message} {location}")]
    AlreadyRunning {
        message: String,
        start_number: u64,
        location: ErrorLocation,
    },

    #[error("Supervisor Disposed: {message} {location}")]
    Disposed {
        message: String,
        location: ErrorLocation,
    },

    #[error("UI Thread Error: {message} {location}")]
    OnUiThread {
        message: String,
        location: ErrorLocation,
    },
}

impl SupervisorError {
    #[track_caller]
    pub fn already_running(start_number: u64) -> Self {
        SupervisorError::AlreadyRunning {
            message: format!("start #{start_number} is still active"),
            start_number,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn disposed() -> Self {
        SupervisorError::Disposed {
            message: "supervisor was already disposed".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn on_ui_thread() -> Self {
        SupervisorError::OnUiThread {
            message: "start_instance must not run on the UI thread".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
