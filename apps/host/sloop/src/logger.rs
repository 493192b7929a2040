//! Logging for the sloop host.
//!
//! Provides dual output (stdout with colors + file) with thread-safe initialization. Records
//! forwarded from the backend are tagged `backend`; file lines also carry the host pid, since
//! successive runs append to the same `sloop.log`.

use crate::error::HostError;

use common::ErrorLocation;

use sloop_core::listeners::BACKEND_LOG_TARGET;

use std::io::stdout;
use std::panic::Location;
use std::path::Path;
use std::process;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use humantime::format_rfc3339;
use log::{LevelFilter, Record, info, warn};

static INIT_LOGGER_ONCE: Once = Once::new();

static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "sloop.log";

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Initialize the logger with dual output (stdout + `sloop.log` in `log_dir`).
///
/// Safe to call multiple times: later calls log a warning and return Ok.
///
/// # Errors
///
/// Returns an error if the log file cannot be created or the dispatcher cannot be installed.
pub fn initialize(log_dir: &Path) -> Result<(), HostError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("Logger already initialized");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_dir);
        if result.is_ok() {
            info!("Logger initialized with level: {LOG_LEVEL:?}");
        }
    });

    result
}

/// `backend` for records relayed from the backend process, otherwise the record's target.
pub(crate) fn source_of<'a>(record: &Record<'a>) -> &'a str {
    match record.target() {
        BACKEND_LOG_TARGET => "backend",
        target => target,
    }
}

/// One plain-text line of the log file.
pub(crate) fn file_line(timestamp: SystemTime, pid: u32, record: &Record) -> String {
    format!(
        "[{date} - {level} pid={pid} {source}] {message} [{file}:{line}]",
        date = format_rfc3339(timestamp),
        level = record.level(),
        source = source_of(record),
        message = record.args(),
        file = record.file().unwrap_or("unknown"),
        line = record.line().unwrap_or(0)
    )
}

#[track_caller]
pub(crate) fn initialize_internal(log_dir: &Path) -> Result<(), HostError> {
    let log_file_path = log_dir.join(LOG_FILE_NAME);

    let color_configuration = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let stdout_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level} {source}] {message}",
                date = format_rfc3339(SystemTime::now()),
                level = color_configuration.color(record.level()),
                source = source_of(record),
            ))
        })
        .chain(stdout());

    let pid = process::id();
    let file_dispatch = Dispatch::new()
        .format(move |out, _message, record| {
            out.finish(format_args!("{}", file_line(SystemTime::now(), pid, record)))
        })
        .chain(
            fern::log_file(&log_file_path).map_err(|e| HostError::Host {
                message: format!("Failed to create log file {}: {e}", log_file_path.display()),
                location: ErrorLocation::from(Location::caller()),
            })?,
        );

    Dispatch::new()
        .level(LOG_LEVEL)
        .chain(stdout_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| HostError::Host {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(())
}
