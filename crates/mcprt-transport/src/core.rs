//! The transport contract (spec.md §4.C): a bidirectional byte-message
//! pipe the engine drives without caring whether the bytes cross a pipe,
//! a socket, or an HTTP connection.

use thiserror::Error;
use tokio::sync::mpsc;

/// Errors a transport can surface to its caller.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("transport is closed")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(String),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// An event surfaced to whoever called [`Transport::start`]. Modeled as a
/// channel rather than registered callbacks: it composes better with
/// `tokio::select!` on the caller side than a set of boxed closures would.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A fully parsed inbound JSON-RPC message.
    Message(serde_json::Value),
    /// A line or frame failed to parse; the transport drops it and keeps
    /// reading rather than desynchronizing (spec.md §4.D).
    Error(TransportError),
    /// The peer end or underlying connection went away.
    Closed,
}

/// A bidirectional byte-message pipe.
///
/// Ordering guarantee: events reach the receiver returned from `start` in
/// the order they arrived on the wire; messages handed to `send` reach the
/// peer in the order `send` was called.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Begin reading. Returns a channel that yields one [`TransportEvent`]
    /// per inbound message, error, or close.
    async fn start(&self) -> TransportResult<mpsc::UnboundedReceiver<TransportEvent>>;

    /// Serialize and enqueue `message`. Returns once it has been handed to
    /// the underlying wire, not once the peer has acknowledged it.
    async fn send(&self, message: &serde_json::Value) -> TransportResult<()>;

    /// Release resources. Any send in flight fails with
    /// [`TransportError::Closed`].
    async fn close(&self) -> TransportResult<()>;

    /// The logical session id this transport is bound to, if the
    /// transport kind has one (streamable-HTTP does; stdio does not).
    fn session_id(&self) -> Option<String> {
        None
    }

    /// Record the negotiated protocol version so it can be attached to
    /// subsequent outbound frames (the `MCP-Protocol-Version` header on
    /// HTTP; a no-op for stdio).
    async fn set_protocol_version(&self, _version: &str) {}
}
