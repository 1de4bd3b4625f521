//! Errors surfaced by the streamable-HTTP transport layer itself, as
//! distinct from the JSON-RPC errors carried inside a message body.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum HttpTransportError {
    #[error("unknown or expired session: {0}")]
    UnknownSession(String),

    #[error("request Host header not in the configured allow-list")]
    HostNotAllowed,

    #[error("request body exceeds the configured size limit")]
    BodyTooLarge,

    #[error("unsupported content type, expected application/json")]
    UnsupportedContentType,

    #[error("missing or unacceptable Accept header")]
    UnacceptableAccept,

    #[error("protocol version mismatch: negotiated {negotiated}, got {got}")]
    ProtocolVersionMismatch { negotiated: String, got: String },

    #[error("malformed JSON body: {0}")]
    MalformedBody(String),
}
