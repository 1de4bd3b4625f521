//! Handlers for every client-initiated method (spec.md §3 "Message
//! catalog", client-to-server half), plus the handshake gate that refuses
//! everything except `initialize`/`ping` until `notifications/initialized`
//! has been received (spec.md §3 "Lifecycle").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use mcprt_engine::{Handler, RequestContext};
use mcprt_wire::completion::CompleteRequest;
use mcprt_wire::core::Implementation;
use mcprt_wire::error::McpError;
use mcprt_wire::initialization::{negotiate_server_version, InitializeRequest, InitializeResult};
use mcprt_wire::logging::{LogLevel, SetLevelRequest};
use mcprt_wire::prompts::{GetPromptRequest, GetPromptResult, ListPromptsResult};
use mcprt_wire::resources::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceRequest, ReadResourceResult,
    SubscribeRequest, UnsubscribeRequest,
};
use mcprt_wire::tools::{CallToolRequest, CallToolResult, ListToolsRequest, ListToolsResult};

use crate::gate::ServerGate;
use crate::registry::Registries;

/// The handshake a server session walks through before ordinary traffic is
/// allowed (spec.md §3 "Lifecycle"): `initialize` must be answered first,
/// and every other client-to-server method is refused until the client's
/// `notifications/initialized` has been observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeState {
    AwaitingInitialize,
    AwaitingInitialized,
    Ready,
}

pub(crate) struct Handshake {
    state: RwLock<HandshakeState>,
    client_info: RwLock<Option<Implementation>>,
}

impl Handshake {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(HandshakeState::AwaitingInitialize),
            client_info: RwLock::new(None),
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        *self.state.read() == HandshakeState::Ready
    }

    pub(crate) fn client_info(&self) -> Option<Implementation> {
        self.client_info.read().clone()
    }
}

/// Wraps a [`Handler`] so it refuses to run until the handshake has
/// reached [`HandshakeState::Ready`] — every registered method except
/// `initialize`/`ping` goes through this (spec.md §8 invariant: no
/// pre-handshake traffic is serviced as though the session were live).
pub(crate) struct Guarded<H> {
    inner: H,
    handshake: Arc<Handshake>,
}

impl<H> Guarded<H> {
    pub(crate) fn new(inner: H, handshake: Arc<Handshake>) -> Self {
        Self { inner, handshake }
    }
}

/// Wraps `inner` in [`Guarded`] and erases it to `Arc<dyn Handler>` — a
/// free function rather than a closure since each call site needs a
/// different concrete `H`, which a single closure value can't express.
pub(crate) fn guard<H: Handler + 'static>(inner: H, handshake: Arc<Handshake>) -> Arc<dyn Handler> {
    Arc::new(Guarded::new(inner, handshake))
}

#[async_trait]
impl<H: Handler> Handler for Guarded<H> {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> Result<Value, McpError> {
        if !self.handshake.is_ready() {
            return Err(McpError::InvalidRequest(
                "session has not completed the initialize handshake".to_string(),
            ));
        }
        self.inner.handle(params, ctx).await
    }
}

pub(crate) struct InitializeHandler {
    pub(crate) server_info: Implementation,
    pub(crate) instructions: Option<String>,
    pub(crate) gate: Arc<ServerGate>,
    pub(crate) handshake: Arc<Handshake>,
}

#[async_trait]
impl Handler for InitializeHandler {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> Result<Value, McpError> {
        {
            let mut state = self.handshake.state.write();
            if *state != HandshakeState::AwaitingInitialize {
                return Err(McpError::InvalidRequest(
                    "initialize was already called on this session".to_string(),
                ));
            }
            *state = HandshakeState::AwaitingInitialized;
        }

        let request: InitializeRequest = serde_json::from_value(params.unwrap_or_default())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;

        *self.gate.peer.write() = request.capabilities.clone();
        *self.handshake.client_info.write() = Some(request.client_info.clone());

        let negotiated = negotiate_server_version(&request.protocol_version);
        debug!(
            client = %request.client_info.name,
            requested = %request.protocol_version,
            negotiated,
            "server handshake: initialize received"
        );
        ctx.set_protocol_version(negotiated).await;

        let result = InitializeResult {
            protocol_version: negotiated.to_string(),
            capabilities: self.gate.local.clone(),
            server_info: self.server_info.clone(),
            instructions: self.instructions.clone(),
        };
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

pub(crate) struct InitializedNotificationHandler {
    pub(crate) handshake: Arc<Handshake>,
}

#[async_trait]
impl Handler for InitializedNotificationHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        let mut state = self.handshake.state.write();
        if *state == HandshakeState::AwaitingInitialized {
            *state = HandshakeState::Ready;
            debug!("server handshake complete, session is now ready");
        }
        Ok(Value::Null)
    }
}

pub(crate) struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        Ok(serde_json::json!({}))
    }
}

pub(crate) struct ToolsListHandler {
    pub(crate) registries: Registries,
}

#[async_trait]
impl Handler for ToolsListHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        let _request: ListToolsRequest = match params {
            Some(v) => serde_json::from_value(v).map_err(|e| McpError::InvalidParams(e.to_string()))?,
            None => ListToolsRequest::default(),
        };
        let result = ListToolsResult {
            tools: self.registries.tools_snapshot(),
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

pub(crate) struct ToolsCallHandler {
    pub(crate) registries: Registries,
}

#[async_trait]
impl Handler for ToolsCallHandler {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> Result<Value, McpError> {
        let request: CallToolRequest = serde_json::from_value(params.unwrap_or_default())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;

        let entry = self
            .registries
            .tools
            .get(&request.name)
            .ok_or_else(|| McpError::InvalidParams(format!("unknown tool: {}", request.name)))?;

        let arguments_value = serde_json::to_value(&request.arguments).unwrap_or(Value::Null);
        let schema_value = serde_json::to_value(&entry.tool.input_schema)
            .map_err(|e| McpError::Internal(e.to_string()))?;
        mcprt_schema::validate(&schema_value, &arguments_value).map_err(|errors| {
            McpError::InvalidParams(format!(
                "arguments for tool {} failed schema validation: {errors}",
                request.name
            ))
        })?;

        let handler = entry.handler.clone();
        drop(entry);
        let result: CallToolResult = match handler.call(request.arguments, ctx).await {
            Ok(result) => result,
            Err(err) => return Err(err),
        };

        if !result.is_error() && entry_output_requires_structured_content(&self.registries, &request.name) {
            if result.structured_content.is_none() {
                return Err(McpError::Internal(format!(
                    "tool {} declared an outputSchema but returned no structuredContent",
                    request.name
                )));
            }
        }

        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

fn entry_output_requires_structured_content(registries: &Registries, name: &str) -> bool {
    registries
        .tools
        .get(name)
        .is_some_and(|e| e.tool.output_schema.is_some())
}

pub(crate) struct ResourcesListHandler {
    pub(crate) registries: Registries,
}

#[async_trait]
impl Handler for ResourcesListHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        let result = ListResourcesResult {
            resources: self.registries.resources_snapshot(),
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

pub(crate) struct ResourceTemplatesListHandler {
    pub(crate) registries: Registries,
}

#[async_trait]
impl Handler for ResourceTemplatesListHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        let result = ListResourceTemplatesResult {
            resource_templates: self.registries.resource_templates_snapshot(),
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

pub(crate) struct ResourcesReadHandler {
    pub(crate) registries: Registries,
}

#[async_trait]
impl Handler for ResourcesReadHandler {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> Result<Value, McpError> {
        let request: ReadResourceRequest = serde_json::from_value(params.unwrap_or_default())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        let handler = self
            .registries
            .resources
            .get(&request.uri)
            .map(|e| e.handler.clone())
            .ok_or_else(|| McpError::InvalidParams(format!("unknown resource: {}", request.uri)))?;
        let result: ReadResourceResult = handler.read(ctx).await?;
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

/// Tracks which resource uris this session has subscribed to, so
/// [`crate::session::ServerSession::notify_resource_updated`] only emits
/// `notifications/resources/updated` to clients that asked for it.
#[derive(Default)]
pub(crate) struct Subscriptions {
    uris: DashMap<String, ()>,
}

impl Subscriptions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_subscribed(&self, uri: &str) -> bool {
        self.uris.contains_key(uri)
    }
}

pub(crate) struct ResourcesSubscribeHandler {
    pub(crate) registries: Registries,
    pub(crate) subscriptions: Arc<Subscriptions>,
}

#[async_trait]
impl Handler for ResourcesSubscribeHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        let request: SubscribeRequest = serde_json::from_value(params.unwrap_or_default())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        if !self.registries.resources.contains_key(&request.uri) {
            return Err(McpError::InvalidParams(format!(
                "unknown resource: {}",
                request.uri
            )));
        }
        self.subscriptions.uris.insert(request.uri, ());
        Ok(serde_json::json!({}))
    }
}

pub(crate) struct ResourcesUnsubscribeHandler {
    pub(crate) subscriptions: Arc<Subscriptions>,
}

#[async_trait]
impl Handler for ResourcesUnsubscribeHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        let request: UnsubscribeRequest = serde_json::from_value(params.unwrap_or_default())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        self.subscriptions.uris.remove(&request.uri);
        Ok(serde_json::json!({}))
    }
}

pub(crate) struct PromptsListHandler {
    pub(crate) registries: Registries,
}

#[async_trait]
impl Handler for PromptsListHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        let result = ListPromptsResult {
            prompts: self.registries.prompts_snapshot(),
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

pub(crate) struct PromptsGetHandler {
    pub(crate) registries: Registries,
}

#[async_trait]
impl Handler for PromptsGetHandler {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> Result<Value, McpError> {
        let request: GetPromptRequest = serde_json::from_value(params.unwrap_or_default())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        let handler = self
            .registries
            .prompts
            .get(&request.name)
            .map(|e| e.handler.clone())
            .ok_or_else(|| McpError::InvalidParams(format!("unknown prompt: {}", request.name)))?;
        let result: GetPromptResult = handler.get(request.arguments, ctx).await?;
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

pub(crate) struct CompletionCompleteHandler {
    pub(crate) handler: Arc<dyn crate::registry::CompletionHandler>,
}

#[async_trait]
impl Handler for CompletionCompleteHandler {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> Result<Value, McpError> {
        let request: CompleteRequest = serde_json::from_value(params.unwrap_or_default())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        let data = self.handler.complete(request, ctx).await?;
        serde_json::to_value(mcprt_wire::completion::CompleteResult { completion: data })
            .map_err(|e| McpError::Internal(e.to_string()))
    }
}

pub(crate) struct LoggingSetLevelHandler {
    pub(crate) level: Arc<RwLock<LogLevel>>,
}

#[async_trait]
impl Handler for LoggingSetLevelHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        let request: SetLevelRequest = serde_json::from_value(params.unwrap_or_default())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        *self.level.write() = request.level;
        Ok(serde_json::json!({}))
    }
}

/// Registered for `notifications/roots/list_changed` so a server that calls
/// `roots/list` again after the client signals a change doesn't have to
/// poll — present for symmetry with the client role even though the base
/// server handlers here don't act on it themselves.
pub(crate) struct RootsListChangedHandler {
    pub(crate) flag: Arc<AtomicBool>,
}

#[async_trait]
impl Handler for RootsListChangedHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        self.flag.store(true, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

