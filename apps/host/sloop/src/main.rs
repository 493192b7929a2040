use sloop::app::{SloopApp, block_on_host, config_file_path};
use sloop::error::HostError;
use sloop::logger::initialize as LoggerInitialize;

use sloop_core::config::{SloopConfig, detect_sloop_paths};
use sloop_core::error::CoreError;
use sloop_core::thread_guard::ThreadGuard;

use common::ErrorLocation;

use std::env::current_exe;
use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;
use std::process::ExitCode;

use log::{debug, error, info};

fn main() -> ExitCode {
    match block_on_host(run()) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) | Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// `.env` from the working directory, then from next to the executable.
fn load_dotenv() -> Vec<PathBuf> {
    let mut loaded = Vec::new();
    if let Ok(path) = dotenvy::dotenv() {
        loaded.push(path);
    }
    if let Some(path) = current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(".env")))
        && path.is_file()
        && dotenvy::from_path(&path).is_ok()
    {
        loaded.push(path);
    }
    loaded
}

async fn run() -> Result<(), HostError> {
    let dotenv_files = load_dotenv();

    let config_path = config_file_path()?;
    let config = SloopConfig::load_file(&config_path).map_err(CoreError::from)?;
    let paths = detect_sloop_paths(&config.paths).map_err(CoreError::from)?;

    create_dir_all(&paths.log_dir).map_err(|e| HostError::Host {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&paths.log_dir)?;

    info!("Sloop host starting");
    info!("Config file: {}", config_path.display());
    info!("Log directory: {}", paths.log_dir.display());
    for file in &dotenv_files {
        debug!("Loaded environment from {}", file.display());
    }

    // The runtime drives this future on the main thread; supervisory work runs on workers.
    let app = SloopApp::new(config, paths, ThreadGuard::bind_current());
    app.start();

    let signal = tokio::signal::ctrl_c().await;
    if let Err(e) = &signal {
        error!("Failed to listen for Ctrl+C: {e}");
    }

    app.shutdown().await;
    info!("Sloop host stopped");

    signal.map_err(|e| HostError::Host {
        message: format!("Signal handling failed: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}
