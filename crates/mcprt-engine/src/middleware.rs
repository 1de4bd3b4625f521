//! The middleware chain both outbound requests and inbound handler
//! dispatch pass through (spec.md §4.F "Middleware chain"): auth
//! injection, logging, retry. Each middleware wraps `next` rather than
//! mutating global state, so the chain composes in either direction.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use mcprt_wire::error::McpError;

/// One request/response exchange, abstracted over whether it's an
/// outbound call to the peer or an inbound handler dispatch — middleware
/// doesn't need to know which. `Clone` so retrying middleware can re-issue
/// it without consuming the original.
#[derive(Clone)]
pub struct MiddlewareRequest {
    pub method: String,
    pub params: Option<Value>,
    /// Methods that mutate state must not be retried unless explicitly
    /// marked idempotent (spec.md §4.F), e.g. `tools/call` by default.
    pub idempotent: bool,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The rest of the chain (or the terminal handler), callable more than
/// once so retry middleware can re-invoke it.
pub type Next = Arc<dyn Fn(MiddlewareRequest) -> BoxFuture<'static, Result<Value, McpError>> + Send + Sync>;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn call(&self, request: MiddlewareRequest, next: Next) -> Result<Value, McpError>;
}

/// Runs an ordered chain of middleware around a terminal handler.
#[derive(Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.layers.push(middleware);
    }

    /// Run `request` through every layer, terminating in `handler`.
    pub async fn run<H, Fut>(&self, request: MiddlewareRequest, handler: H) -> Result<Value, McpError>
    where
        H: Fn(MiddlewareRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, McpError>> + Send + 'static,
    {
        let terminal: Next = Arc::new(move |req| Box::pin(handler(req)));
        let chained = self
            .layers
            .iter()
            .rev()
            .fold(terminal, |next, layer| {
                let layer = layer.clone();
                let next = next.clone();
                Arc::new(move |req: MiddlewareRequest| {
                    let layer = layer.clone();
                    let next = next.clone();
                    Box::pin(async move { layer.call(req, next).await }) as BoxFuture<'static, _>
                })
            });
        chained(request).await
    }
}

/// Retries on transient errors with exponential backoff, up to a
/// configured cap. Never retries non-idempotent requests (spec.md §4.F) —
/// by default that means `tools/call` is never retried unless a handler
/// explicitly flags its `MiddlewareRequest` as idempotent.
pub struct RetryMiddleware {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryMiddleware {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    async fn call(&self, request: MiddlewareRequest, next: Next) -> Result<Value, McpError> {
        if !request.idempotent {
            return next(request).await;
        }

        let mut delay = self.base_delay;
        let mut attempt = 0;
        loop {
            match next(request.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt + 1 < self.max_attempts && is_retryable(&err) => {
                    attempt += 1;
                    warn!(method = %request.method, attempt, "retrying after a temporary error");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn is_retryable(err: &McpError) -> bool {
    matches!(err, McpError::Internal(_) | McpError::RequestTimeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chain_with_no_layers_runs_the_terminal_handler() {
        let chain = MiddlewareChain::new();
        let result = chain
            .run(
                MiddlewareRequest {
                    method: "ping".into(),
                    params: None,
                    idempotent: true,
                },
                |_req| async { Ok(serde_json::json!({"ok": true})) },
            )
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn retry_middleware_skips_non_idempotent_requests() {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(RetryMiddleware {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }));
        let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let result = chain
            .run(
                MiddlewareRequest {
                    method: "tools/call".into(),
                    params: None,
                    idempotent: false,
                },
                move |_req| {
                    let attempts = attempts_clone.clone();
                    async move {
                        attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        Err(McpError::Internal("boom".into()))
                    }
                },
            )
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_middleware_retries_idempotent_requests_on_transient_errors() {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(RetryMiddleware {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }));
        let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let result = chain
            .run(
                MiddlewareRequest {
                    method: "resources/list".into(),
                    params: None,
                    idempotent: true,
                },
                move |_req| {
                    let attempts = attempts_clone.clone();
                    async move {
                        let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        if n < 2 {
                            Err(McpError::Internal("transient".into()))
                        } else {
                            Ok(serde_json::json!({"ok": true}))
                        }
                    }
                },
            )
            .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
