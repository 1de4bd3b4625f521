//! Errors the engine can surface to a caller awaiting an outbound request,
//! distinct from [`mcprt_wire::McpError`] which models the wire-level
//! taxonomy a *handler* returns (spec.md §7).

use thiserror::Error;

use mcprt_transport::TransportError;
use mcprt_wire::jsonrpc::JsonRpcError;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("request timed out")]
    Timeout,

    #[error("request was cancelled")]
    Cancelled,

    #[error("session is closed")]
    Closed,

    #[error("peer returned an error: {0}")]
    Remote(JsonRpcError),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("capability {0:?} not advertised by peer")]
    CapabilityMissing(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
