//! Platform-aware detection of sloop data directories.
//!
//! Lookup order:
//! 1. SLOOP_DATA_DIR environment variable (explicit override)
//! 2. Platform-specific data directory via `dirs` crate
//! 3. `$HOME` / `%APPDATA%` fallback
//!
//! Returns Result, never silently falls back to wrong path.

use super::PathsConfig;
use crate::SLOOP_DATA_DIR_ENV;
use crate::error::paths::PathError;

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

const DATA_DIR_NAME: &str = "sloop";
const STORAGE_DIR_NAME: &str = "storage";
const WORK_DIR_NAME: &str = "work";
const USER_HOME_DIR_NAME: &str = ".sloop";
const LOG_DIR_NAME: &str = "logs";

/// Resolved directories handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SloopPaths {
    pub data_dir: PathBuf,
    pub storage_root: PathBuf,
    pub work_dir: PathBuf,
    pub user_home: PathBuf,
    pub log_dir: PathBuf,
    pub source: PathSource,
}

/// How the data directory was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    EnvVar,
    PlatformDefault,
    HomeFallback,
}

impl Display for PathSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PathSource::EnvVar => write!(f, "{SLOOP_DATA_DIR_ENV}"),
            PathSource::PlatformDefault => write!(f, "platform default"),
            PathSource::HomeFallback => write!(f, "home fallback"),
        }
    }
}

fn detect_data_dir() -> Result<(PathBuf, PathSource), PathError> {
    if let Ok(custom_dir) = env::var(SLOOP_DATA_DIR_ENV)
        && !custom_dir.trim().is_empty()
    {
        let data_dir = PathBuf::from(custom_dir);
        info!("Using {SLOOP_DATA_DIR_ENV} override: {}", data_dir.display());
        return Ok((data_dir, PathSource::EnvVar));
    }

    if let Some(data_dir) = dirs::data_local_dir() {
        let data_dir = data_dir.join(DATA_DIR_NAME);
        debug!("Platform data dir: {}", data_dir.display());
        return Ok((data_dir, PathSource::PlatformDefault));
    }

    let home = env::var_os("HOME").or_else(|| env::var_os("APPDATA"));
    if let Some(home) = home {
        let data_dir = PathBuf::from(home).join(format!(".{DATA_DIR_NAME}"));
        warn!("Using home fallback path: {}", data_dir.display());
        return Ok((data_dir, PathSource::HomeFallback));
    }

    Err(PathError::detection(format!(
        "Cannot determine sloop data directory. Set {SLOOP_DATA_DIR_ENV} environment variable."
    )))
}

fn default_user_home(data_dir: &Path) -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(USER_HOME_DIR_NAME))
        .unwrap_or_else(|| data_dir.join(USER_HOME_DIR_NAME))
}

/// Detect sloop paths, applying per-directory overrides from configuration.
///
/// # Errors
/// Returns `PathError::Detection` if no data directory can be determined.
pub fn detect_sloop_paths(overrides: &PathsConfig) -> Result<SloopPaths, PathError> {
    let (data_dir, source) = detect_data_dir()?;

    let storage_root = overrides
        .storage_root
        .clone()
        .unwrap_or_else(|| data_dir.join(STORAGE_DIR_NAME));
    let work_dir = overrides
        .work_dir
        .clone()
        .unwrap_or_else(|| data_dir.join(WORK_DIR_NAME));
    let user_home = overrides
        .user_home
        .clone()
        .unwrap_or_else(|| default_user_home(&data_dir));
    let log_dir = data_dir.join(LOG_DIR_NAME);

    info!("Sloop data dir ({source}): {}", data_dir.display());

    Ok(SloopPaths {
        data_dir,
        storage_root,
        work_dir,
        user_home,
        log_dir,
        source,
    })
}
