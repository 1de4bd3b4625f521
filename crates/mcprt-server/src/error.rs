//! Errors surfaced by the server role, layered over [`mcprt_engine::EngineError`]
//! with the registration- and handshake-specific failures that have no
//! engine-level analogue.

use thiserror::Error;

use mcprt_engine::EngineError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("a tool named {0:?} is already registered")]
    DuplicateTool(String),

    #[error("a resource at {0:?} is already registered")]
    DuplicateResource(String),

    #[error("a prompt named {0:?} is already registered")]
    DuplicatePrompt(String),

    #[error("malformed request: {0}")]
    Malformed(String),
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;
