//! The client role (spec.md §4.G): drives the handshake, exposes typed
//! wrappers for every client-initiated method, and dispatches
//! server-initiated requests to caller-supplied handlers.

pub mod error;
pub mod handlers;
pub mod operations;
pub mod session;

pub use error::{ClientError, ClientResult};
pub use handlers::{
    ElicitationHandler, HandlerRegistry, RootsHandler, SamplingHandler, StaticRootsHandler,
};
pub use session::{ClientSession, ClientSessionBuilder};
