use crate::listeners::{ListenerAttacher, LogListener, RpcListener};
use crate::transport::ResponseError;

use std::sync::Arc;

use log::Level;
use serde_json::{Value, json};

#[test]
fn given_backend_level_names_when_mapped_then_host_levels_returned() {
    assert_eq!(LogListener::level("ERROR"), Level::Error);
    assert_eq!(LogListener::level("warn"), Level::Warn);
    assert_eq!(LogListener::level("WARNING"), Level::Warn);
    assert_eq!(LogListener::level("Info"), Level::Info);
    assert_eq!(LogListener::level("DEBUG"), Level::Debug);
    assert_eq!(LogListener::level("TRACE"), Level::Trace);
    assert_eq!(LogListener::level("something-else"), Level::Trace);
}

/// **VALUE**: Verifies listeners decline requests they do not implement with the standard code.
///
/// **WHY THIS MATTERS**: A backend waiting on an unanswered request would hang forever.
#[test]
fn given_listener_without_request_handler_when_request_arrives_then_method_not_found() {
    // GIVEN: The log listener, which only handles notifications
    let listener = LogListener;

    // WHEN: A request is routed to it
    let result = listener.on_request("log", Value::Null);

    // THEN: method-not-found
    assert_eq!(
        result.unwrap_err().code,
        ResponseError::METHOD_NOT_FOUND
    );
}

#[test]
fn given_malformed_log_params_when_notified_then_ignored_without_panic() {
    let listener = LogListener;

    listener.on_notification("log", json!({"unexpected": true}));
    listener.on_notification("other", json!({"level": "INFO", "message": "x"}));
    listener.on_notification(
        "log",
        json!({"level": "INFO", "message": "ready", "configScopeId": "scope-1"}),
    );
}

#[test]
fn given_attacher_when_built_then_reports_listener_count() {
    let empty = ListenerAttacher::default();
    let attacher = ListenerAttacher::new(vec![Arc::new(LogListener)]);

    assert!(empty.is_empty());
    assert_eq!(attacher.len(), 1);
}
