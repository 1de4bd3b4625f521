//! Default handling for server-initiated requests (spec.md §4.G "Client
//! role"): `sampling/createMessage`, `elicitation/create`, `roots/list`.
//!
//! Each has a typed handler trait a caller can implement; absent an
//! implementation the method responds `MethodNotFound` rather than
//! silently succeeding with nothing, so a server can tell the difference
//! between "client declined" and "client doesn't support this at all".

use async_trait::async_trait;
use std::sync::Arc;

use mcprt_wire::elicitation::{ElicitRequest, ElicitResult};
use mcprt_wire::error::McpError;
use mcprt_wire::roots::{ListRootsRequest, ListRootsResult, Root};
use mcprt_wire::sampling::{CreateMessageRequest, CreateMessageResult};

#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(
        &self,
        request: CreateMessageRequest,
    ) -> Result<CreateMessageResult, McpError>;
}

#[async_trait]
pub trait ElicitationHandler: Send + Sync {
    async fn elicit(&self, request: ElicitRequest) -> Result<ElicitResult, McpError>;
}

#[async_trait]
pub trait RootsHandler: Send + Sync {
    async fn list_roots(&self, request: ListRootsRequest) -> Result<ListRootsResult, McpError>;
}

/// A fixed list of roots, the common case for a client that isn't doing
/// anything dynamic with filesystem access.
pub struct StaticRootsHandler {
    roots: Vec<Root>,
}

impl StaticRootsHandler {
    pub fn new(roots: Vec<Root>) -> Self {
        Self { roots }
    }
}

#[async_trait]
impl RootsHandler for StaticRootsHandler {
    async fn list_roots(&self, _request: ListRootsRequest) -> Result<ListRootsResult, McpError> {
        Ok(ListRootsResult {
            roots: self.roots.clone(),
        })
    }
}

/// The set of handlers a [`crate::session::ClientSession`] dispatches
/// server-initiated requests to. Each slot starts empty; registering a
/// handler should go hand in hand with advertising the matching
/// capability in [`crate::session::ClientSessionBuilder`], since the
/// engine's capability gate will otherwise refuse the inbound request
/// before it ever reaches here.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    pub sampling: Option<Arc<dyn SamplingHandler>>,
    pub elicitation: Option<Arc<dyn ElicitationHandler>>,
    pub roots: Option<Arc<dyn RootsHandler>>,
}
