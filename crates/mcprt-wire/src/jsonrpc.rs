//! JSON-RPC 2.0 envelope types.
//!
//! Requests, responses, notifications, and the standard error object, kept
//! deliberately separate from the MCP message catalog in [`crate::messages`]
//! so the envelope can be validated before its `method`/`params` are known.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::ids::{RequestId, ResponseId};

/// The only JSON-RPC version this implementation speaks.
pub const JSONRPC_VERSION: &str = "2.0";

/// Zero-sized marker that serializes to/from the literal string `"2.0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version: {version}"
            )))
        }
    }
}

/// A JSON-RPC request: expects exactly one response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC notification: no id, no response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
        }
    }
}

/// Standard JSON-RPC error codes, plus the MCP `RequestTimeout` extension
/// (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// MCP extension: a request's deadline elapsed before a response arrived.
    RequestTimeout,
}

impl JsonRpcErrorCode {
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::RequestTimeout => -32001,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -32700 => Some(Self::ParseError),
            -32600 => Some(Self::InvalidRequest),
            -32601 => Some(Self::MethodNotFound),
            -32602 => Some(Self::InvalidParams),
            -32603 => Some(Self::InternalError),
            -32001 => Some(Self::RequestTimeout),
            _ => None,
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: JsonRpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The mutually-exclusive payload of a response: a `result` or an `error`,
/// never both (spec.md §4.B).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    Success { result: Value },
    Error { error: JsonRpcError },
}

/// A JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: JsonRpcVersion,
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
    pub id: ResponseId,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Success { result },
            id: ResponseId::from_request(id),
        }
    }

    pub fn error(id: ResponseId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Error { error },
            id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, JsonRpcResponsePayload::Error { .. })
    }
}

/// Any of the three JSON-RPC message shapes that can arrive on the wire.
/// Discriminated by presence of `method` (request/notification) vs.
/// `result`/`error` (response), and by presence of `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_round_trips() {
        let req = JsonRpcRequest::new(RequestId::Number(1), "ping", None);
        let text = serde_json::to_string(&req).unwrap();
        let back: JsonRpcRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(back.method, "ping");
        assert_eq!(back.id, RequestId::Number(1));
    }

    #[test]
    fn response_success_and_error_are_mutually_exclusive() {
        let ok = JsonRpcResponse::success(RequestId::Number(1), json!({"ok": true}));
        assert!(!ok.is_error());
        let text = serde_json::to_string(&ok).unwrap();
        assert!(text.contains("\"result\""));
        assert!(!text.contains("\"error\""));

        let err = JsonRpcResponse::error(
            ResponseId::from_request(RequestId::Number(1)),
            JsonRpcError::new(JsonRpcErrorCode::MethodNotFound, "nope"),
        );
        assert!(err.is_error());
    }

    #[test]
    fn response_id_null_for_parse_errors() {
        let id = ResponseId::null();
        assert!(id.is_null());
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn rejects_wrong_jsonrpc_version() {
        let bad = json!({"jsonrpc": "1.0", "method": "ping"});
        let result: Result<JsonRpcNotification, _> = serde_json::from_value(bad);
        assert!(result.is_err());
    }
}
