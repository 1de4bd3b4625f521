//! The protocol engine (spec.md §4.F): the role-agnostic heart that both
//! `mcprt-client` and `mcprt-server` drive. It owns request-id allocation,
//! the outbound pending-request table, the inbound in-flight table, the
//! notification debouncer, and the middleware chain; it knows nothing
//! about `initialize` handshakes or registries, which live one layer up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use mcprt_schema::envelope::{validate_envelope, EnvelopeKind};
use mcprt_transport::{Transport, TransportError, TransportEvent};
use mcprt_wire::error::McpError;
use mcprt_wire::ids::{ProgressToken, RequestId, ResponseId};
use mcprt_wire::jsonrpc::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcResponsePayload,
};

use crate::capability::{CapabilityGate, NoGate};
use crate::context::RequestContext;
use crate::debounce::Debouncer;
use crate::error::{EngineError, EngineResult};
use crate::handler::Handler;
use crate::ids::RequestIdAllocator;
use crate::inflight::InflightRequests;
use crate::middleware::{MiddlewareChain, MiddlewareRequest};
use crate::pending::{PendingRequests, ProgressEvent};

/// Engine-wide tuning. `default_timeout` applies to every outbound request
/// that doesn't override it via [`RequestOptions::timeout`]; `touch_extension`
/// is how far [`crate::pending::TouchHandle::touch`] pushes the deadline out.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_timeout: Duration,
    pub touch_extension: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(60),
            touch_extension: Duration::from_secs(60),
        }
    }
}

/// Per-call overrides for [`Engine::request`]/[`Engine::call`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    /// Attach a fresh `_meta.progressToken` and track progress events for
    /// this call (spec.md §4.F "Progress").
    pub with_progress: bool,
    /// Whether this method may be safely retried by [`crate::middleware::RetryMiddleware`].
    pub idempotent: bool,
}

/// Cheap to clone; every [`RequestContext`] holds one so handlers can emit
/// progress without reaching back into the engine's internals.
pub type EngineHandle = Arc<Engine>;

pub struct Engine {
    transport: Arc<dyn Transport>,
    pending: PendingRequests,
    inflight: InflightRequests,
    ids: RequestIdAllocator,
    handlers: DashMap<String, Arc<dyn Handler>>,
    debouncer: Debouncer,
    middleware: MiddlewareChain,
    gate: RwLock<Arc<dyn CapabilityGate>>,
    progress_state: DashMap<ProgressToken, f64>,
    config: EngineConfig,
    closed: AtomicBool,
}

impl Engine {
    pub fn new(transport: Arc<dyn Transport>, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            transport,
            pending: PendingRequests::new(),
            inflight: InflightRequests::new(),
            ids: RequestIdAllocator::new(),
            handlers: DashMap::new(),
            debouncer: Debouncer::new(),
            middleware: MiddlewareChain::new(),
            gate: RwLock::new(Arc::new(NoGate)),
            progress_state: DashMap::new(),
            config,
            closed: AtomicBool::new(false),
        })
    }

    pub fn set_capability_gate(&self, gate: Arc<dyn CapabilityGate>) {
        *self.gate.write() = gate;
    }

    /// Register the handler for `method`. Role layers call this once per
    /// supported method during setup, before [`Self::start`].
    pub fn register_handler(&self, method: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(method.into(), handler);
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    /// Push the version negotiated during `initialize` down into the
    /// transport, so HTTP can start echoing `MCP-Protocol-Version` on
    /// subsequent calls (spec.md §4.E); a no-op for transports that don't
    /// care (stdio).
    pub async fn set_protocol_version(&self, version: &str) {
        self.transport.set_protocol_version(version).await;
    }

    /// Begin reading from the transport and dispatching inbound traffic.
    /// Spawns the read loop and returns immediately; the loop runs for the
    /// lifetime of the engine (or until the transport closes).
    pub async fn start(self: &Arc<Self>) -> EngineResult<()> {
        let mut rx = self.transport.start().await?;
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    TransportEvent::Message(value) => {
                        let engine = Arc::clone(&engine);
                        tokio::spawn(async move { engine.on_message(value).await });
                    }
                    TransportEvent::Error(err) => {
                        warn!(%err, "transport reported a malformed frame, continuing");
                    }
                    TransportEvent::Closed => {
                        debug!("transport closed, draining pending requests");
                        engine.closed.store(true, Ordering::SeqCst);
                        engine.pending.drain_closed();
                        break;
                    }
                }
            }
        });
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        self.transport.session_id()
    }

    async fn on_message(self: Arc<Self>, value: Value) {
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => {
                self.send_parse_error("envelope must be a JSON object").await;
                return;
            }
        };
        if obj.contains_key("method") {
            if obj.contains_key("id") {
                self.dispatch_request(value).await;
            } else {
                self.dispatch_notification(value).await;
            }
        } else {
            self.handle_response(value).await;
        }
    }

    async fn send_parse_error(&self, detail: &str) {
        let response = JsonRpcResponse::error(
            ResponseId::null(),
            JsonRpcError::new(JsonRpcErrorCode::ParseError, detail),
        );
        if let Ok(value) = serde_json::to_value(&response) {
            let _ = self.transport.send(&value).await;
        }
    }

    // ---- Request path (inbound), spec.md §4.F ----

    async fn dispatch_request(self: Arc<Self>, value: Value) {
        if let Err(errors) = validate_envelope(&value, EnvelopeKind::Request) {
            warn!(?errors, "rejecting malformed request envelope");
            self.send_parse_error(&errors.to_string()).await;
            return;
        }
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(err) => {
                self.send_parse_error(&err.to_string()).await;
                return;
            }
        };

        let id = request.id.clone();
        let response_id = ResponseId::from_request(id.clone());

        let handler = match self.handlers.get(&request.method).map(|h| h.clone()) {
            Some(h) => h,
            None => {
                self.send_error_response(
                    response_id,
                    JsonRpcError::new(
                        JsonRpcErrorCode::MethodNotFound,
                        format!("unknown method: {}", request.method),
                    ),
                )
                .await;
                return;
            }
        };

        if let Some(cap) = self.gate.read().required(&request.method) {
            if !self.gate.read().local_satisfies(cap) {
                self.send_error_response(
                    response_id,
                    JsonRpcError::new(
                        JsonRpcErrorCode::InvalidRequest,
                        format!("capability {cap:?} was not advertised"),
                    ),
                )
                .await;
                return;
            }
        }

        let progress_token = extract_progress_token(request.params.as_ref());
        let cancel = self.inflight.start(id.clone());
        let session_id = self.session_id();
        let ctx = RequestContext::new(progress_token, cancel, Arc::clone(&self), session_id);

        let mw_request = MiddlewareRequest {
            method: request.method.clone(),
            params: request.params.clone(),
            idempotent: false,
        };
        let engine = Arc::clone(&self);
        let handler_for_chain = Arc::clone(&handler);
        let ctx_for_chain = ctx.clone();
        let result = self
            .middleware
            .run(mw_request, move |req| {
                let handler = Arc::clone(&handler_for_chain);
                let ctx = ctx_for_chain.clone();
                let params = req.params.clone();
                async move { handler.handle(params, ctx).await }
            })
            .await;

        if engine.inflight.is_cancelled(&id) {
            trace!(%id, "handler finished after cancellation, suppressing response");
            engine.inflight.finish(&id);
            return;
        }
        engine.inflight.finish(&id);

        match result {
            Ok(value) => engine.send_success_response(id, value).await,
            Err(err) => {
                engine
                    .send_error_response(response_id, JsonRpcError::from(err))
                    .await
            }
        }
    }

    async fn send_success_response(&self, id: RequestId, result: Value) {
        let response = JsonRpcResponse::success(id, result);
        if let Ok(value) = serde_json::to_value(&response) {
            let _ = self.transport.send(&value).await;
        }
    }

    async fn send_error_response(&self, id: ResponseId, error: JsonRpcError) {
        let response = JsonRpcResponse::error(id, error);
        if let Ok(value) = serde_json::to_value(&response) {
            let _ = self.transport.send(&value).await;
        }
    }

    // ---- Notification path (inbound) ----

    async fn dispatch_notification(self: Arc<Self>, value: Value) {
        if let Err(errors) = validate_envelope(&value, EnvelopeKind::Notification) {
            warn!(?errors, "dropping malformed notification");
            return;
        }
        let notification: JsonRpcNotification = match serde_json::from_value(value) {
            Ok(n) => n,
            Err(err) => {
                warn!(%err, "dropping unparseable notification");
                return;
            }
        };

        match notification.method.as_str() {
            "notifications/cancelled" => {
                if let Some(id) = notification
                    .params
                    .as_ref()
                    .and_then(|p| p.get("requestId"))
                    .and_then(request_id_from_value)
                {
                    self.inflight.cancel(&id);
                }
            }
            "notifications/progress" => {
                self.handle_progress_notification(notification.params);
            }
            method => {
                if let Some(handler) = self.handlers.get(method).map(|h| h.clone()) {
                    let session_id = self.session_id();
                    let cancel = tokio_util::sync::CancellationToken::new();
                    let ctx = RequestContext::new(None, cancel, Arc::clone(&self), session_id);
                    if let Err(err) = handler.handle(notification.params, ctx).await {
                        warn!(%err, method, "notification handler returned an error, discarding (no response path)");
                    }
                } else {
                    trace!(method, "no handler registered for notification");
                }
            }
        }
    }

    fn handle_progress_notification(&self, params: Option<Value>) {
        let Some(params) = params else { return };
        let Some(token) = params.get("progressToken").and_then(progress_token_from_value) else {
            return;
        };
        let Some(progress) = params.get("progress").and_then(Value::as_f64) else {
            return;
        };
        let total = params.get("total").and_then(Value::as_f64);
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(id) = progress_token_as_request_id(&token) {
            self.pending.deliver_progress(
                &id,
                ProgressEvent {
                    progress,
                    total,
                    message,
                },
            );
        }
    }

    // ---- Response path (inbound, answers our own outbound requests) ----

    async fn handle_response(&self, value: Value) {
        if let Err(errors) = validate_envelope(&value, EnvelopeKind::Response) {
            warn!(?errors, "dropping malformed response");
            return;
        }
        let response: JsonRpcResponse = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(err) => {
                warn!(%err, "dropping unparseable response");
                return;
            }
        };
        let Some(id) = response.id.as_request_id().cloned() else {
            warn!("response carried a null id, nothing to correlate it to");
            return;
        };
        if !self.pending.contains(&id) {
            trace!(%id, "response for unknown or already-resolved request id");
            return;
        }
        let result = match response.payload {
            JsonRpcResponsePayload::Success { result } => Ok(result),
            JsonRpcResponsePayload::Error { error } => Err(EngineError::Remote(error)),
        };
        self.pending.resolve(&id, result);
    }

    // ---- Outbound requests/notifications ----

    /// Issue an outbound request and return a live handle: the caller
    /// decides whether to stream progress via [`OutboundCall::next_progress`]
    /// or just `.wait()` for the final result.
    pub async fn request(
        self: &Arc<Self>,
        method: impl Into<String>,
        params: Option<Value>,
        opts: RequestOptions,
    ) -> EngineResult<OutboundCall> {
        let method = method.into();
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        if let Some(cap) = self.gate.read().required(&method) {
            if !self.gate.read().peer_satisfies(cap) {
                return Err(EngineError::CapabilityMissing(cap.to_string()));
            }
        }

        let id = self.ids.allocate();
        let params = if opts.with_progress {
            Some(inject_progress_token(params, ProgressToken::from(&id)))
        } else {
            params
        };

        let timeout = opts.timeout.unwrap_or(self.config.default_timeout);
        let handle = self.pending.register(id.clone(), timeout, opts.with_progress);

        let request = JsonRpcRequest::new(id.clone(), method, params);
        let value = serde_json::to_value(&request)
            .map_err(|err| EngineError::Malformed(err.to_string()))?;
        if let Err(err) = self.transport.send(&value).await {
            self.pending.resolve(&id, Err(EngineError::Transport(err.clone())));
            return Err(EngineError::Transport(err));
        }

        Ok(OutboundCall {
            engine: Arc::clone(self),
            id,
            handle,
        })
    }

    /// Convenience wrapper: issue a request and await its final result,
    /// handling timeout/cancel cleanup (discard + `notifications/cancelled`)
    /// without the caller needing to drive it manually.
    pub async fn call(
        self: &Arc<Self>,
        method: impl Into<String>,
        params: Option<Value>,
        opts: RequestOptions,
    ) -> EngineResult<Value> {
        let call = self.request(method, params, opts).await?;
        call.wait().await
    }

    /// Send a fire-and-forget outbound notification.
    pub async fn notify(&self, method: impl Into<String>, params: Option<Value>) -> EngineResult<()> {
        let notification = JsonRpcNotification::new(method, params);
        let value = serde_json::to_value(&notification)
            .map_err(|err| EngineError::Malformed(err.to_string()))?;
        self.transport.send(&value).await?;
        Ok(())
    }

    /// Debounced variant of [`Self::notify`] (spec.md §4.F "Notification
    /// debouncing"): if `method` is in the debounced set, coalesce bursts
    /// into a single flush fired after the configured delay.
    pub async fn notify_debounced(self: &Arc<Self>, method: impl Into<String>, params: Option<Value>) {
        let method = method.into();
        if !self.debouncer.is_debounced(&method) {
            let _ = self.notify(method, params).await;
            return;
        }
        if self.debouncer.mark_pending(&method) {
            let engine = Arc::clone(self);
            let delay = self.debouncer.flush_delay();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if engine.debouncer.take_pending(&method) {
                    let _ = engine.notify(method, params).await;
                }
            });
        }
    }

    /// Called by [`RequestContext::report_progress`]. Enforces monotonic
    /// non-decrease per progress token (spec.md §8): a regressed value is
    /// logged and dropped rather than forwarded to a confused waiter.
    pub async fn send_progress(
        &self,
        token: ProgressToken,
        progress: f64,
        total: Option<f64>,
        message: Option<String>,
    ) {
        let monotonic = match self.progress_state.get(&token) {
            Some(last) if progress < *last => false,
            _ => true,
        };
        if !monotonic {
            warn!(?token, progress, "dropping non-monotonic progress update");
            return;
        }
        self.progress_state.insert(token.clone(), progress);

        let mut params = json!({ "progressToken": token, "progress": progress });
        if let Some(total) = total {
            params["total"] = json!(total);
        }
        if let Some(message) = message {
            params["message"] = json!(message);
        }
        let _ = self.notify("notifications/progress", Some(params)).await;
    }

    pub async fn close(&self) -> EngineResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.pending.drain_closed();
        self.transport.close().await?;
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// A live outbound request: either stream its progress and resolve it
/// yourself, or just `.wait()` for the convenience path.
pub struct OutboundCall {
    engine: Arc<Engine>,
    id: RequestId,
    handle: crate::pending::RequestHandle,
}

impl OutboundCall {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn touch(&self) {
        self.handle.touch();
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub async fn next_progress(&mut self) -> Option<ProgressEvent> {
        self.handle.next_progress().await
    }

    /// Await the final outcome. On timeout or cancellation this also
    /// discards the pending-table entry and sends `notifications/cancelled`
    /// to the peer, so a response arriving afterward is a harmless no-op
    /// (spec.md §4.F "CANCEL_SENT").
    pub async fn wait(self) -> EngineResult<Value> {
        let OutboundCall { engine, id, handle } = self;
        let extension = engine.config.touch_extension;
        let result = handle.wait(extension).await;
        if matches!(result, Err(EngineError::Timeout) | Err(EngineError::Cancelled)) {
            engine.pending.discard(&id);
            let reason = match &result {
                Err(EngineError::Timeout) => "timeout",
                Err(EngineError::Cancelled) => "cancelled by caller",
                _ => unreachable!(),
            };
            let _ = engine
                .notify(
                    "notifications/cancelled",
                    Some(json!({ "requestId": id, "reason": reason })),
                )
                .await;
        }
        result
    }
}

fn extract_progress_token(params: Option<&Value>) -> Option<ProgressToken> {
    params?
        .get("_meta")?
        .get("progressToken")
        .and_then(progress_token_from_value)
}

fn progress_token_from_value(value: &Value) -> Option<ProgressToken> {
    match value {
        Value::String(s) => Some(ProgressToken::String(s.clone())),
        Value::Number(n) => n.as_i64().map(ProgressToken::Number),
        _ => None,
    }
}

fn progress_token_as_request_id(token: &ProgressToken) -> Option<RequestId> {
    match token {
        ProgressToken::String(s) => Some(RequestId::String(s.clone())),
        ProgressToken::Number(n) => Some(RequestId::Number(*n)),
    }
}

fn request_id_from_value(value: &Value) -> Option<RequestId> {
    match value {
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        _ => None,
    }
}

fn inject_progress_token(params: Option<Value>, token: ProgressToken) -> Value {
    let mut params = params.unwrap_or_else(|| json!({}));
    if !params.is_object() {
        params = json!({});
    }
    params["_meta"]["progressToken"] = json!(token);
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex as TokioMutex;

    struct MockTransport {
        outbox: TokioMutex<Vec<Value>>,
        inbox_tx: TokioMutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    }

    impl MockTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                outbox: TokioMutex::new(Vec::new()),
                inbox_tx: TokioMutex::new(None),
            })
        }

        async fn push(&self, event: TransportEvent) {
            if let Some(tx) = self.inbox_tx.lock().await.as_ref() {
                let _ = tx.send(event);
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn start(&self) -> mcprt_transport::TransportResult<mpsc::UnboundedReceiver<TransportEvent>> {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.inbox_tx.lock().await = Some(tx);
            Ok(rx)
        }

        async fn send(&self, message: &Value) -> mcprt_transport::TransportResult<()> {
            self.outbox.lock().await.push(message.clone());
            Ok(())
        }

        async fn close(&self) -> mcprt_transport::TransportResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatches_a_registered_handler_and_sends_success_response() {
        let transport = MockTransport::new();
        let engine = Engine::new(transport.clone(), EngineConfig::default());
        engine.register_handler(
            "ping",
            Arc::new(crate::handler::FnHandler::new(|_params, _ctx| async move {
                Ok(json!({ "ok": true }))
            })),
        );
        engine.clone().start().await.unwrap();

        transport
            .push(TransportEvent::Message(
                json!({"jsonrpc": "2.0", "method": "ping", "id": 1}),
            ))
            .await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let outbox = transport.outbox.lock().await;
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0]["result"], json!({ "ok": true }));
    }

    #[tokio::test]
    async fn unknown_method_returns_method_not_found() {
        let transport = MockTransport::new();
        let engine = Engine::new(transport.clone(), EngineConfig::default());
        engine.clone().start().await.unwrap();

        transport
            .push(TransportEvent::Message(
                json!({"jsonrpc": "2.0", "method": "tools/explode", "id": 7}),
            ))
            .await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let outbox = transport.outbox.lock().await;
        assert_eq!(outbox[0]["error"]["code"], json!(-32601));
    }

    #[tokio::test]
    async fn outbound_request_resolves_on_matching_response() {
        let transport = MockTransport::new();
        let engine = Engine::new(transport.clone(), EngineConfig::default());
        engine.clone().start().await.unwrap();

        let engine2 = engine.clone();
        let transport2 = transport.clone();
        let call_task = tokio::spawn(async move {
            engine2
                .call("ping", None, RequestOptions::default())
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        let sent_id = {
            let outbox = transport.outbox.lock().await;
            outbox[0]["id"].clone()
        };
        let _ = transport2;
        transport
            .push(TransportEvent::Message(
                json!({"jsonrpc": "2.0", "id": sent_id, "result": {"pong": true}}),
            ))
            .await;

        let result = call_task.await.unwrap().unwrap();
        assert_eq!(result, json!({"pong": true}));
    }

    #[tokio::test]
    async fn outbound_request_times_out_and_notifies_cancellation() {
        let transport = MockTransport::new();
        let engine = Engine::new(
            transport.clone(),
            EngineConfig {
                default_timeout: Duration::from_millis(20),
                touch_extension: Duration::from_secs(60),
            },
        );
        engine.clone().start().await.unwrap();

        let result = engine.call("ping", None, RequestOptions::default()).await;
        assert!(matches!(result, Err(EngineError::Timeout)));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let outbox = transport.outbox.lock().await;
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox[1]["method"], json!("notifications/cancelled"));
    }

    #[tokio::test]
    async fn capability_gate_blocks_outbound_request() {
        struct DenyGate;
        impl CapabilityGate for DenyGate {
            fn required(&self, _method: &str) -> Option<&'static str> {
                Some("tools")
            }
            fn local_satisfies(&self, _cap: &str) -> bool {
                true
            }
            fn peer_satisfies(&self, _cap: &str) -> bool {
                false
            }
        }
        let transport = MockTransport::new();
        let engine = Engine::new(transport, EngineConfig::default());
        engine.set_capability_gate(Arc::new(DenyGate));
        engine.clone().start().await.unwrap();

        let result = engine
            .call("tools/list", None, RequestOptions::default())
            .await;
        assert!(matches!(result, Err(EngineError::CapabilityMissing(_))));
    }
}
