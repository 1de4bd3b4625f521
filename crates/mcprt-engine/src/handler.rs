//! The dispatch-table side of the engine: a [`Handler`] answers one method
//! name. Role layers (`mcprt-client`, `mcprt-server`) register one handler
//! per method they support; the engine looks the method up by name rather
//! than matching on a class hierarchy (spec.md §9 "Dynamic-dispatch
//! message unions" — replaced with a table of plain functions).

use async_trait::async_trait;
use serde_json::Value;

use mcprt_wire::error::McpError;

use crate::context::RequestContext;

/// Handles exactly one JSON-RPC method.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> Result<Value, McpError>;
}

/// Adapts a plain async closure into a [`Handler`], for methods simple
/// enough not to warrant their own type.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Option<Value>, RequestContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, McpError>> + Send,
{
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> Result<Value, McpError> {
        (self.f)(params, ctx).await
    }
}
