use crate::error::transport::TransportError;
use crate::transport::message::split_method;
use crate::transport::{Message, RequestId, ResponseError};

use serde_json::{Value, json};

/// **VALUE**: Verifies inbound messages are classified by which of `id` and `method` they carry.
///
/// **BUG THIS CATCHES**: Would catch a backend request being mistaken for a response and
/// completing an unrelated pending call.
#[test]
fn given_id_and_method_when_classified_then_request() {
    // GIVEN: A message with both id and method
    let raw = json!({"jsonrpc": "2.0", "id": 7, "method": "connection/getCredentials", "params": {"connectionId": "a"}});

    // WHEN: Classifying
    let message = Message::from_value(raw).unwrap();

    // THEN: It is a request carrying its params
    assert_eq!(
        message,
        Message::Request {
            id: RequestId::Number(7),
            method: "connection/getCredentials".to_string(),
            params: json!({"connectionId": "a"}),
        }
    );
}

#[test]
fn given_method_without_id_when_classified_then_notification() {
    let raw = json!({"jsonrpc": "2.0", "method": "log/log", "params": {"level": "INFO"}});

    let message = Message::from_value(raw).unwrap();

    assert!(matches!(message, Message::Notification { ref method, .. } if method == "log/log"));
}

#[test]
fn given_null_id_with_method_when_classified_then_notification() {
    let raw = json!({"jsonrpc": "2.0", "id": null, "method": "log/log"});

    let message = Message::from_value(raw).unwrap();

    assert_eq!(
        message,
        Message::Notification {
            method: "log/log".to_string(),
            params: Value::Null,
        }
    );
}

#[test]
fn given_id_with_result_when_classified_then_successful_response() {
    let raw = json!({"jsonrpc": "2.0", "id": "abc", "result": {"ok": true}});

    let message = Message::from_value(raw).unwrap();

    assert_eq!(
        message,
        Message::Response {
            id: RequestId::String("abc".to_string()),
            result: Ok(json!({"ok": true})),
        }
    );
}

#[test]
fn given_id_with_error_when_classified_then_failed_response() {
    let raw = json!({"jsonrpc": "2.0", "id": 3, "error": {"code": -32601, "message": "nope"}});

    let message = Message::from_value(raw).unwrap();

    assert_eq!(
        message,
        Message::Response {
            id: RequestId::Number(3),
            result: Err(ResponseError::new(-32601, "nope")),
        }
    );
}

#[test]
fn given_response_without_result_when_classified_then_null_result() {
    let raw = json!({"jsonrpc": "2.0", "id": 4});

    let message = Message::from_value(raw).unwrap();

    assert_eq!(
        message,
        Message::Response {
            id: RequestId::Number(4),
            result: Ok(Value::Null),
        }
    );
}

#[test]
fn given_neither_id_nor_method_when_classified_then_protocol_error() {
    let result = Message::from_value(json!({"jsonrpc": "2.0"}));

    assert!(matches!(result, Err(TransportError::Protocol { .. })));
}

#[test]
fn given_non_object_when_classified_then_protocol_error() {
    let result = Message::from_value(json!([1, 2, 3]));

    assert!(matches!(result, Err(TransportError::Protocol { .. })));
}

#[test]
fn given_non_string_method_when_classified_then_protocol_error() {
    let result = Message::from_value(json!({"id": 1, "method": 42}));

    assert!(matches!(result, Err(TransportError::Protocol { .. })));
}

#[test]
fn given_error_response_when_serialized_then_error_field_and_version_present() {
    let message = Message::Response {
        id: RequestId::Number(9),
        result: Err(ResponseError::method_not_found("foo/bar")),
    };

    let value = message.into_value();

    assert_eq!(
        value,
        json!({
            "jsonrpc": "2.0",
            "id": 9,
            "error": {"code": -32601, "message": "Unhandled method: foo/bar"},
        })
    );
}

#[test]
fn given_qualified_method_when_split_then_service_and_name() {
    assert_eq!(split_method("configuration/didAddConfigurationScopes"), (
        "configuration",
        "didAddConfigurationScopes"
    ));
    assert_eq!(split_method("initialize"), ("", "initialize"));
}
