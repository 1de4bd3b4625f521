//! Streamable-HTTP transport (spec.md §4.E): a single endpoint handling
//! both the synchronous POST request/response exchange and the SSE
//! upstream channel, backed by a session table so many independent MCP
//! sessions can share one axum listener.

pub mod config;
pub mod error;
pub mod router;
pub mod session;

pub use config::HttpConfig;
pub use error::HttpTransportError;
pub use router::{build_router, HttpAppState, SessionFactory};
pub use session::{HttpSessionTransport, SessionTable};
