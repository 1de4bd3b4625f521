//! The server role (spec.md §4.G "Server role"): capability-gated
//! handshake, the tool/resource/prompt registries, and the handlers that
//! answer every client-initiated method. Built on top of `mcprt-engine`
//! the same way `mcprt-client` is — this crate owns the server-specific
//! half of the handshake and the registries; the engine owns correlation,
//! progress, cancellation, and middleware.

pub mod error;
mod gate;
mod handlers;
pub mod registry;
pub mod session;

pub use error::{ServerError, ServerResult};
pub use registry::{CompletionHandler, PromptHandler, Registries, ResourceHandler, ToolHandler};
pub use session::{ServerHandle, ServerSession, ServerSessionBuilder};
