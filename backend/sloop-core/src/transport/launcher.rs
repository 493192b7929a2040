//! Locating and spawning the backend executable.

use super::Connection;
use crate::error::transport::TransportError;
use crate::listeners::ListenerAttacher;
use crate::{SLOOP_BACKEND_BINARY, SLOOP_BACKEND_PATH_ENV};

use common::ErrorLocation;

use std::collections::BTreeMap;
use std::env::{self, consts::EXE_SUFFIX, current_exe};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::{debug, info};
use tokio::process::Command as TokioCommand;

/// Produces a fresh [`Connection`] to a new backend each time it is called.
pub trait BackendLauncher: Send + Sync {
    /// The returned connection must already route inbound traffic to `listeners`.
    fn launch(&self, listeners: &ListenerAttacher) -> Result<Connection, TransportError>;
}

/// Resolves the backend executable.
///
/// Lookup order:
/// 1. Path from configuration
/// 2. `SLOOP_BACKEND_PATH` environment variable
/// 3. Binary next to the current executable
/// 4. `PATH`
///
/// An explicit path (1 or 2) that does not exist is an error, never a silent fallback.
#[derive(Debug, Clone, Default)]
pub struct BackendLocator {
    configured: Option<PathBuf>,
}

impl BackendLocator {
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self { configured }
    }

    pub fn locate(&self) -> Result<PathBuf, TransportError> {
        if let Some(path) = &self.configured {
            return explicit_path(path, "backend.executable");
        }

        if let Some(path) = env::var_os(SLOOP_BACKEND_PATH_ENV) {
            return explicit_path(Path::new(&path), SLOOP_BACKEND_PATH_ENV);
        }

        if let Some(path) = sibling_binary() {
            debug!("Using backend next to current executable: {}", path.display());
            return Ok(path);
        }

        if let Some(path) = search_path(&binary_file_name()) {
            debug!("Using backend from PATH: {}", path.display());
            return Ok(path);
        }

        Err(TransportError::locate(format!(
            "Cannot find {}. Set {SLOOP_BACKEND_PATH_ENV} or backend.executable in the config file.",
            binary_file_name()
        )))
    }
}

fn explicit_path(path: &Path, source: &str) -> Result<PathBuf, TransportError> {
    if path.is_file() {
        info!("Using backend from {source}: {}", path.display());
        Ok(path.to_path_buf())
    } else {
        Err(TransportError::locate(format!(
            "Backend executable from {source} does not exist: {}",
            path.display()
        )))
    }
}

pub(crate) fn binary_file_name() -> String {
    format!("{SLOOP_BACKEND_BINARY}{EXE_SUFFIX}")
}

fn sibling_binary() -> Option<PathBuf> {
    let exe = current_exe().ok()?;
    let candidate = exe.parent()?.join(binary_file_name());
    candidate.is_file().then_some(candidate)
}

pub(crate) fn search_path(file_name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub request_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

pub(crate) fn build_launch_command(program: &Path, options: &LaunchOptions) -> TokioCommand {
    let mut cmd = TokioCommand::new(program);
    cmd.args(&options.args)
        .envs(&options.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &options.working_dir {
        cmd.current_dir(dir);
    }
    cmd
}

/// Spawns the located backend with piped stdio for each new connection.
pub struct ProcessLauncher {
    locator: BackendLocator,
    options: LaunchOptions,
}

impl ProcessLauncher {
    pub fn new(locator: BackendLocator, options: LaunchOptions) -> Self {
        Self { locator, options }
    }
}

impl BackendLauncher for ProcessLauncher {
    fn launch(&self, listeners: &ListenerAttacher) -> Result<Connection, TransportError> {
        let program = self.locator.locate()?;
        debug!("Spawning backend {}", program.display());

        let child = build_launch_command(&program, &self.options)
            .spawn()
            .map_err(|e| TransportError::Spawn {
                message: format!("Failed to spawn {}: {e}", program.display()),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(e),
            })?;

        info!("Spawned backend {} (PID: {:?})", program.display(), child.id());

        Connection::over_process(child, listeners, self.options.request_timeout)
    }
}
