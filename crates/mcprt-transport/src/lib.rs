//! The transport contract and the stdio transport that implements it.
//!
//! Streamable-HTTP lives in `mcprt-http` instead of here: it needs axum
//! and a session table, which stdio has no use for.

pub mod core;
pub mod stdio;

pub use core::{Transport, TransportError, TransportEvent, TransportResult};
pub use stdio::{ChildProcessSpec, StdioClientTransport, StdioServerTransport};
