//! JSON-RPC 2.0 envelopes exchanged with the backend.

use crate::error::transport::TransportError;

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseError {
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Unhandled method: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, message)
    }
}

/// A decoded inbound or outbound JSON-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        id: RequestId,
        method: String,
        params: Value,
    },
    Response {
        id: RequestId,
        result: Result<Value, ResponseError>,
    },
    Notification {
        method: String,
        params: Value,
    },
}

impl Message {
    /// Classifies a raw JSON value: `id` + `method` is a request, `id` alone a response,
    /// `method` alone a notification.
    pub fn from_value(value: Value) -> Result<Self, TransportError> {
        let Value::Object(mut object) = value else {
            return Err(TransportError::protocol("message is not a JSON object"));
        };

        let id = match object.remove("id") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(serde_json::from_value::<RequestId>(raw)?),
        };
        let method = match object.remove("method") {
            None => None,
            Some(Value::String(method)) => Some(method),
            Some(other) => {
                return Err(TransportError::protocol(format!(
                    "method must be a string, got {other}"
                )));
            }
        };
        let params = object.remove("params").unwrap_or(Value::Null);

        match (id, method) {
            (Some(id), Some(method)) => Ok(Message::Request { id, method, params }),
            (None, Some(method)) => Ok(Message::Notification { method, params }),
            (Some(id), None) => {
                let result = match object.remove("error") {
                    Some(error) if !error.is_null() => {
                        Err(serde_json::from_value::<ResponseError>(error)?)
                    }
                    _ => Ok(object.remove("result").unwrap_or(Value::Null)),
                };
                Ok(Message::Response { id, result })
            }
            (None, None) => Err(TransportError::protocol(
                "message has neither an id nor a method",
            )),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Message::Request { id, method, params } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "method": method,
                "params": params,
            }),
            Message::Notification { method, params } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "method": method,
                "params": params,
            }),
            Message::Response { id, result } => {
                let mut object = Map::new();
                object.insert("jsonrpc".into(), Value::from(JSONRPC_VERSION));
                object.insert("id".into(), json!(id));
                match result {
                    Ok(value) => object.insert("result".into(), value),
                    Err(error) => object.insert("error".into(), json!(error)),
                };
                Value::Object(object)
            }
        }
    }
}

/// Splits `"service/method"` into its two halves. Root-level methods have an empty service.
pub fn split_method(method: &str) -> (&str, &str) {
    match method.split_once('/') {
        Some((service, name)) => (service, name),
        None => ("", method),
    }
}
