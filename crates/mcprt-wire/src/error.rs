//! Library-internal error type, kept distinct from the wire-level
//! [`crate::jsonrpc::JsonRpcError`] so callers can match on structured
//! variants before it gets flattened to a code+message pair for the wire
//! (spec.md §7 "Error taxonomy").

use thiserror::Error;

use crate::jsonrpc::{JsonRpcError, JsonRpcErrorCode};

#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to parse message: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("request timed out")]
    RequestTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl McpError {
    fn code(&self) -> JsonRpcErrorCode {
        match self {
            McpError::Parse(_) => JsonRpcErrorCode::ParseError,
            McpError::InvalidRequest(_) => JsonRpcErrorCode::InvalidRequest,
            McpError::MethodNotFound(_) => JsonRpcErrorCode::MethodNotFound,
            McpError::InvalidParams(_) => JsonRpcErrorCode::InvalidParams,
            McpError::RequestTimeout => JsonRpcErrorCode::RequestTimeout,
            McpError::Internal(_) => JsonRpcErrorCode::InternalError,
        }
    }
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        JsonRpcError::new(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_not_found_maps_to_minus_32601() {
        let wire: JsonRpcError = McpError::MethodNotFound("tools/explode".into()).into();
        assert_eq!(wire.code, -32601);
    }

    #[test]
    fn request_timeout_maps_to_mcp_extension_code() {
        let wire: JsonRpcError = McpError::RequestTimeout.into();
        assert_eq!(wire.code, -32001);
    }
}
