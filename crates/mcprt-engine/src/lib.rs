//! The symmetric JSON-RPC protocol engine (spec.md §4.F): correlation,
//! progress, cancellation, timeouts, debouncing, and middleware, shared by
//! both the client and server roles in `mcprt-client`/`mcprt-server`.
//!
//! This crate has no opinion about `initialize` handshakes, tool/resource
//! registries, or transport selection — it dispatches by method name and
//! tracks in-flight state, nothing more.

pub mod capability;
pub mod context;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod handler;
pub mod ids;
pub mod inflight;
pub mod middleware;
pub mod pending;

pub use capability::{CapabilityGate, NoGate};
pub use context::RequestContext;
pub use debounce::Debouncer;
pub use engine::{Engine, EngineConfig, EngineHandle, OutboundCall, RequestOptions};
pub use error::{EngineError, EngineResult};
pub use handler::{FnHandler, Handler};
pub use ids::RequestIdAllocator;
pub use middleware::{Middleware, MiddlewareChain, MiddlewareRequest, Next, RetryMiddleware};
pub use pending::{ProgressEvent, TouchHandle};
