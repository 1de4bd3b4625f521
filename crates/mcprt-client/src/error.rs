//! Errors surfaced by the client role, layered over [`mcprt_engine::EngineError`]
//! with the handshake-specific failures that have no engine-level analogue.

use thiserror::Error;

use mcprt_engine::EngineError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("server negotiated unsupported protocol version: {0}")]
    UnsupportedProtocolVersion(String),

    #[error("operation attempted before initialize() completed")]
    NotInitialized,

    #[error("initialize() called twice on the same client")]
    AlreadyInitialized,

    #[error("malformed server response: {0}")]
    Malformed(String),

    /// A tool result is missing something the protocol requires outright
    /// (spec.md §4.I: `structuredContent` absent when `outputSchema` was
    /// declared) — distinct from a result that's present but wrong, so
    /// callers can retry the latter differently from the former.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A tool result was present but failed validation against its
    /// declared `outputSchema` (spec.md §4.I).
    #[error("invalid params: {0}")]
    InvalidParams(String),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
