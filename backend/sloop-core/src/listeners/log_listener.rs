use super::RpcListener;

use log::{Level, log, warn};
use serde::Deserialize;
use serde_json::Value;

pub const BACKEND_LOG_TARGET: &str = "sloop::backend";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogParams {
    level: String,
    message: String,
    #[serde(default)]
    config_scope_id: Option<String>,
    #[serde(default)]
    stack_trace: Option<String>,
}

/// Re-emits the backend's `log/log` notifications through the host logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl LogListener {
    pub(crate) fn level(raw: &str) -> Level {
        match raw.to_ascii_uppercase().as_str() {
            "ERROR" => Level::Error,
            "WARN" | "WARNING" => Level::Warn,
            "INFO" => Level::Info,
            "DEBUG" => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl RpcListener for LogListener {
    fn service(&self) -> &str {
        "log"
    }

    fn on_notification(&self, method: &str, params: Value) {
        if method != "log" {
            warn!("Unknown log notification: {method}");
            return;
        }

        let params: LogParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                warn!("Malformed log notification: {e}");
                return;
            }
        };

        let level = Self::level(&params.level);
        match params.config_scope_id {
            Some(scope) => log!(target: BACKEND_LOG_TARGET, level, "[{scope}] {}", params.message),
            None => log!(target: BACKEND_LOG_TARGET, level, "{}", params.message),
        }
        if let Some(stack_trace) = params.stack_trace {
            log!(target: BACKEND_LOG_TARGET, level, "{stack_trace}");
        }
    }
}
