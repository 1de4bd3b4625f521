//! Server role (spec.md §4.G "Server role"): a fluent builder for the tool/
//! resource/prompt registries and capability set, producing either a single
//! stdio-attached session ([`ServerHandle::serve`]) or a
//! [`mcprt_http::SessionFactory`] ([`ServerHandle::session_factory`]) that
//! the streamable-HTTP router calls once per incoming session.
//!
//! The split exists because [`mcprt_http::router::SessionFactory`] is a
//! synchronous closure: the HTTP router builds and registers a session's
//! engine itself, then starts it. [`ServerHandle::build_engine`] is that
//! synchronous half; [`ServerHandle::serve`] is the stdio convenience that
//! also calls [`mcprt_engine::Engine::start`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use mcprt_engine::{Engine, EngineConfig, EngineHandle};
use mcprt_http::HttpSessionTransport;
use mcprt_transport::Transport;
use mcprt_wire::capabilities::{
    CompletionsCapability, LoggingCapability, PromptsCapability, ResourcesCapability,
    ServerCapabilities, ToolsCapability,
};
use mcprt_wire::core::Implementation;
use mcprt_wire::logging::LogLevel;
use mcprt_wire::prompts::Prompt;
use mcprt_wire::resources::{Resource, ResourceTemplate};
use mcprt_wire::tools::Tool;

use crate::error::{ServerError, ServerResult};
use crate::gate::ServerGate;
use crate::handlers::{
    guard, CompletionCompleteHandler, Handshake, InitializeHandler, InitializedNotificationHandler,
    LoggingSetLevelHandler, PingHandler, PromptsGetHandler, PromptsListHandler,
    ResourceTemplatesListHandler, ResourcesListHandler, ResourcesReadHandler,
    ResourcesSubscribeHandler, ResourcesUnsubscribeHandler, Subscriptions, ToolsCallHandler,
    ToolsListHandler,
};
use crate::registry::{CompletionHandler, PromptHandler, Registries, ResourceHandler, ToolHandler};

/// One entry in a [`ServerHandle`]'s live-session ledger: the engine plus
/// the per-connection resource subscriptions that live alongside it.
struct LiveSession {
    engine: EngineHandle,
    subscriptions: Arc<Subscriptions>,
}

/// Shared state behind a running server: the registries, the capability
/// set derived from what was registered, and the ledger of every
/// currently-live session so that registering a tool after the server is
/// already serving streamable-HTTP traffic can broadcast `list_changed`
/// to every connected client, not just the next one.
#[derive(Clone)]
pub struct ServerHandle {
    server_info: Implementation,
    instructions: Option<String>,
    capabilities: Arc<RwLock<ServerCapabilities>>,
    registries: Registries,
    completion_handler: Option<Arc<dyn CompletionHandler>>,
    log_level: Arc<RwLock<LogLevel>>,
    engine_config: EngineConfig,
    live: Arc<DashMap<u64, LiveSession>>,
    next_id: Arc<AtomicU64>,
}

impl ServerHandle {
    fn next_key(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Construct, register handlers on, and configure the capability gate
    /// for a new session's engine — but do not call
    /// [`mcprt_engine::Engine::start`]; the caller (stdio's [`Self::serve`]
    /// or the streamable-HTTP router via [`Self::session_factory`]) decides
    /// when reading from the transport begins.
    pub fn build_engine(&self, transport: Arc<dyn Transport>) -> EngineHandle {
        let engine = Engine::new(transport, self.engine_config.clone());
        let handshake = Arc::new(Handshake::new());
        let subscriptions = Arc::new(Subscriptions::new());

        let gate = Arc::new(ServerGate {
            local: self.capabilities.read().clone(),
            peer: RwLock::new(mcprt_wire::capabilities::ClientCapabilities::default()),
        });
        engine.set_capability_gate(gate.clone());

        engine.register_handler(
            "initialize",
            Arc::new(InitializeHandler {
                server_info: self.server_info.clone(),
                instructions: self.instructions.clone(),
                gate,
                handshake: handshake.clone(),
            }),
        );
        engine.register_handler(
            "notifications/initialized",
            Arc::new(InitializedNotificationHandler {
                handshake: handshake.clone(),
            }),
        );
        engine.register_handler("ping", Arc::new(PingHandler));

        engine.register_handler(
            "tools/list",
            guard(
                ToolsListHandler {
                    registries: self.registries.clone(),
                },
                handshake.clone(),
            ),
        );
        engine.register_handler(
            "tools/call",
            guard(
                ToolsCallHandler {
                    registries: self.registries.clone(),
                },
                handshake.clone(),
            ),
        );
        engine.register_handler(
            "resources/list",
            guard(
                ResourcesListHandler {
                    registries: self.registries.clone(),
                },
                handshake.clone(),
            ),
        );
        engine.register_handler(
            "resources/templates/list",
            guard(
                ResourceTemplatesListHandler {
                    registries: self.registries.clone(),
                },
                handshake.clone(),
            ),
        );
        engine.register_handler(
            "resources/read",
            guard(
                ResourcesReadHandler {
                    registries: self.registries.clone(),
                },
                handshake.clone(),
            ),
        );
        engine.register_handler(
            "resources/subscribe",
            guard(
                ResourcesSubscribeHandler {
                    registries: self.registries.clone(),
                    subscriptions: subscriptions.clone(),
                },
                handshake.clone(),
            ),
        );
        engine.register_handler(
            "resources/unsubscribe",
            guard(
                ResourcesUnsubscribeHandler {
                    subscriptions: subscriptions.clone(),
                },
                handshake.clone(),
            ),
        );
        engine.register_handler(
            "prompts/list",
            guard(
                PromptsListHandler {
                    registries: self.registries.clone(),
                },
                handshake.clone(),
            ),
        );
        engine.register_handler(
            "prompts/get",
            guard(
                PromptsGetHandler {
                    registries: self.registries.clone(),
                },
                handshake.clone(),
            ),
        );
        if let Some(handler) = self.completion_handler.clone() {
            engine.register_handler(
                "completion/complete",
                guard(CompletionCompleteHandler { handler }, handshake.clone()),
            );
        }
        engine.register_handler(
            "logging/setLevel",
            guard(
                LoggingSetLevelHandler {
                    level: self.log_level.clone(),
                },
                handshake.clone(),
            ),
        );

        self.live.insert(
            self.next_key(),
            LiveSession {
                engine: engine.clone(),
                subscriptions,
            },
        );
        engine
    }

    /// Single-session convenience for stdio: build the engine, start it,
    /// and perform the handshake wait implicitly by handing back a
    /// [`ServerSession`] the caller can register further tools through.
    pub async fn serve(&self, transport: Arc<dyn Transport>) -> ServerResult<ServerSession> {
        let engine = self.build_engine(transport);
        engine.start().await.map_err(ServerError::Engine)?;
        Ok(ServerSession {
            handle: self.clone(),
            engine,
        })
    }

    /// A closure suitable for [`mcprt_http::HttpAppState::factory`]: the
    /// router calls this synchronously on each new session, then starts
    /// the returned engine itself.
    pub fn session_factory(&self) -> mcprt_http::SessionFactory {
        let handle = self.clone();
        Arc::new(move |transport: Arc<HttpSessionTransport>| {
            let transport: Arc<dyn Transport> = transport;
            handle.build_engine(transport)
        })
    }

    fn broadcast(&self, method: &'static str) {
        for entry in self.live.iter() {
            let engine = entry.engine.clone();
            let method = method.to_string();
            tokio::spawn(async move {
                engine.notify_debounced(method, None).await;
            });
        }
    }

    pub fn register_tool(&self, tool: Tool, handler: Arc<dyn ToolHandler>) -> ServerResult<()> {
        if self.registries.tools.contains_key(&tool.name) {
            return Err(ServerError::DuplicateTool(tool.name));
        }
        self.registries.insert_tool(tool, handler);
        self.broadcast("notifications/tools/list_changed");
        Ok(())
    }

    pub fn unregister_tool(&self, name: &str) {
        if self.registries.remove_tool(name) {
            self.broadcast("notifications/tools/list_changed");
        }
    }

    pub fn register_resource(&self, resource: Resource, handler: Arc<dyn ResourceHandler>) -> ServerResult<()> {
        if self.registries.resources.contains_key(&resource.uri) {
            return Err(ServerError::DuplicateResource(resource.uri));
        }
        self.registries.insert_resource(resource, handler);
        self.broadcast("notifications/resources/list_changed");
        Ok(())
    }

    pub fn unregister_resource(&self, uri: &str) {
        if self.registries.remove_resource(uri) {
            self.broadcast("notifications/resources/list_changed");
        }
    }

    pub fn register_resource_template(&self, template: ResourceTemplate) {
        self.registries.insert_resource_template(template);
        self.broadcast("notifications/resources/list_changed");
    }

    pub fn register_prompt(&self, prompt: Prompt, handler: Arc<dyn PromptHandler>) -> ServerResult<()> {
        if self.registries.prompts.contains_key(&prompt.name) {
            return Err(ServerError::DuplicatePrompt(prompt.name));
        }
        self.registries.insert_prompt(prompt, handler);
        self.broadcast("notifications/prompts/list_changed");
        Ok(())
    }

    pub fn unregister_prompt(&self, name: &str) {
        if self.registries.remove_prompt(name) {
            self.broadcast("notifications/prompts/list_changed");
        }
    }

    /// Emit `notifications/resources/updated` to every live session
    /// subscribed to `uri` (spec.md §3 message catalog).
    pub fn notify_resource_updated(&self, uri: &str) {
        for entry in self.live.iter() {
            if !entry.subscriptions.is_subscribed(uri) {
                continue;
            }
            let engine = entry.engine.clone();
            let params = serde_json::json!({ "uri": uri });
            tokio::spawn(async move {
                let _ = engine.notify("notifications/resources/updated", Some(params)).await;
            });
        }
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }
}

/// Builds a [`ServerHandle`]: register tools/resources/prompts and set the
/// server's identity up front, then call [`Self::build`] to hand back the
/// shared handle used to serve one or many sessions.
pub struct ServerSessionBuilder {
    server_info: Implementation,
    instructions: Option<String>,
    capabilities: ServerCapabilities,
    registries: Registries,
    completion_handler: Option<Arc<dyn CompletionHandler>>,
    log_level: LogLevel,
    engine_config: EngineConfig,
}

impl ServerSessionBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            server_info: Implementation::new(name, version),
            instructions: None,
            capabilities: ServerCapabilities::default(),
            registries: Registries::new(),
            completion_handler: None,
            log_level: LogLevel::Info,
            engine_config: EngineConfig::default(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    pub fn with_tool(self, tool: Tool, handler: Arc<dyn ToolHandler>) -> Self {
        self.registries.insert_tool(tool, handler);
        self.with_tools_capability()
    }

    fn with_tools_capability(mut self) -> Self {
        self.capabilities.tools = Some(ToolsCapability {
            list_changed: Some(true),
        });
        self
    }

    pub fn with_resource(self, resource: Resource, handler: Arc<dyn ResourceHandler>) -> Self {
        self.registries.insert_resource(resource, handler);
        self.with_resources_capability()
    }

    pub fn with_resource_template(self, template: ResourceTemplate) -> Self {
        self.registries.insert_resource_template(template);
        self.with_resources_capability()
    }

    fn with_resources_capability(mut self) -> Self {
        self.capabilities.resources = Some(ResourcesCapability {
            subscribe: Some(true),
            list_changed: Some(true),
        });
        self
    }

    pub fn with_prompt(self, prompt: Prompt, handler: Arc<dyn PromptHandler>) -> Self {
        self.registries.insert_prompt(prompt, handler);
        self.with_prompts_capability()
    }

    fn with_prompts_capability(mut self) -> Self {
        self.capabilities.prompts = Some(PromptsCapability {
            list_changed: Some(true),
        });
        self
    }

    pub fn with_completion_handler(mut self, handler: Arc<dyn CompletionHandler>) -> Self {
        self.capabilities.completions = Some(CompletionsCapability {});
        self.completion_handler = Some(handler);
        self
    }

    pub fn with_logging(mut self) -> Self {
        self.capabilities.logging = Some(LoggingCapability {});
        self
    }

    pub fn build(self) -> ServerHandle {
        ServerHandle {
            server_info: self.server_info,
            instructions: self.instructions,
            capabilities: Arc::new(RwLock::new(self.capabilities)),
            registries: self.registries,
            completion_handler: self.completion_handler,
            log_level: Arc::new(RwLock::new(self.log_level)),
            engine_config: self.engine_config,
            live: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// A single live connection produced by [`ServerHandle::serve`]. Registry
/// mutations here go through the shared [`ServerHandle`] so they are
/// visible to, and broadcast across, every other session built from the
/// same handle.
pub struct ServerSession {
    handle: ServerHandle,
    pub(crate) engine: EngineHandle,
}

impl ServerSession {
    pub fn server_info(&self) -> &Implementation {
        &self.handle.server_info
    }

    pub fn instructions(&self) -> Option<&str> {
        self.handle.instructions.as_deref()
    }

    pub fn handle(&self) -> &ServerHandle {
        &self.handle
    }

    pub async fn close(&self) -> ServerResult<()> {
        self.engine.close().await.map_err(ServerError::Engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcprt_engine::RequestContext;
    use mcprt_transport::{TransportEvent, TransportResult};
    use mcprt_wire::error::McpError;
    use mcprt_wire::resources::ReadResourceResult;
    use mcprt_wire::tools::{CallToolResult, ObjectSchema};
    use serde_json::Value;
    use std::collections::HashMap;
    use tokio::sync::{mpsc, Mutex as TokioMutex};

    struct LoopbackTransport {
        inbox_tx: TokioMutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
        outbox: TokioMutex<Vec<Value>>,
    }

    impl LoopbackTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inbox_tx: TokioMutex::new(None),
                outbox: TokioMutex::new(Vec::new()),
            })
        }

        async fn push(&self, value: Value) {
            if let Some(tx) = self.inbox_tx.lock().await.as_ref() {
                let _ = tx.send(TransportEvent::Message(value));
            }
        }
    }

    #[async_trait]
    impl Transport for LoopbackTransport {
        async fn start(&self) -> TransportResult<mpsc::UnboundedReceiver<TransportEvent>> {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.inbox_tx.lock().await = Some(tx);
            Ok(rx)
        }

        async fn send(&self, message: &Value) -> TransportResult<()> {
            self.outbox.lock().await.push(message.clone());
            Ok(())
        }

        async fn close(&self) -> TransportResult<()> {
            Ok(())
        }
    }

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        async fn call(
            &self,
            arguments: Option<HashMap<String, Value>>,
            _ctx: RequestContext,
        ) -> Result<CallToolResult, McpError> {
            let text = arguments
                .and_then(|mut a| a.remove("text"))
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            Ok(CallToolResult::text(text))
        }
    }

    struct StaticResource(&'static str);

    #[async_trait]
    impl ResourceHandler for StaticResource {
        async fn read(&self, _ctx: RequestContext) -> Result<ReadResourceResult, McpError> {
            Ok(ReadResourceResult {
                contents: vec![mcprt_wire::content::ResourceContent::Text {
                    uri: "file:///greeting.txt".to_string(),
                    mime_type: Some("text/plain".to_string()),
                    text: self.0.to_string(),
                }],
            })
        }
    }

    fn echo_tool() -> Tool {
        Tool::new("echo")
            .with_description("echoes the text argument back")
            .with_input_schema(ObjectSchema {
                schema_type: "object".to_string(),
                properties: Some(HashMap::from([(
                    "text".to_string(),
                    serde_json::json!({"type": "string"}),
                )])),
                required: Some(vec!["text".to_string()]),
                additional_properties: Some(false),
            })
    }

    async fn handshake(transport: &Arc<LoopbackTransport>, request_id: Value) {
        transport
            .push(serde_json::json!({
                "jsonrpc": "2.0",
                "id": request_id,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2025-06-18",
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "0.1.0"},
                }
            }))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        transport
            .push(serde_json::json!({
                "jsonrpc": "2.0",
                "method": "notifications/initialized",
            }))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn handshake_gates_traffic_until_initialized() {
        let transport = LoopbackTransport::new();
        let handle = ServerSessionBuilder::new("test-server", "0.1.0")
            .with_tool(echo_tool(), Arc::new(EchoTool))
            .build();
        let session = handle.serve(transport.clone() as Arc<dyn Transport>).await.unwrap();

        transport
            .push(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 99,
                "method": "tools/list",
            }))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        {
            let outbox = transport.outbox.lock().await;
            let premature = outbox.iter().find(|m| m["id"] == serde_json::json!(99));
            assert!(premature.unwrap()["error"]["code"].is_number());
        }

        handshake(&transport, serde_json::json!(1)).await;

        transport
            .push(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 100,
                "method": "tools/list",
            }))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let outbox = transport.outbox.lock().await;
        let listed = outbox.iter().find(|m| m["id"] == serde_json::json!(100)).unwrap();
        assert_eq!(listed["result"]["tools"][0]["name"], serde_json::json!("echo"));

        drop(outbox);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn tool_call_validates_arguments_against_input_schema() {
        let transport = LoopbackTransport::new();
        let handle = ServerSessionBuilder::new("test-server", "0.1.0")
            .with_tool(echo_tool(), Arc::new(EchoTool))
            .build();
        let _session = handle.serve(transport.clone() as Arc<dyn Transport>).await.unwrap();
        handshake(&transport, serde_json::json!(1)).await;

        transport
            .push(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/call",
                "params": {"name": "echo", "arguments": {}}
            }))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let outbox = transport.outbox.lock().await;
        let response = outbox.iter().find(|m| m["id"] == serde_json::json!(2)).unwrap();
        assert_eq!(response["error"]["code"], serde_json::json!(-32602));
    }

    #[tokio::test]
    async fn resource_read_dispatches_to_registered_handler() {
        let transport = LoopbackTransport::new();
        let resource = Resource {
            name: "greeting".to_string(),
            title: None,
            uri: "file:///greeting.txt".to_string(),
            description: None,
            mime_type: Some("text/plain".to_string()),
            annotations: None,
            size: None,
            meta: None,
        };
        let handle = ServerSessionBuilder::new("test-server", "0.1.0")
            .with_resource(resource, Arc::new(StaticResource("hello")))
            .build();
        let _session = handle.serve(transport.clone() as Arc<dyn Transport>).await.unwrap();
        handshake(&transport, serde_json::json!(1)).await;

        transport
            .push(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "resources/read",
                "params": {"uri": "file:///greeting.txt"}
            }))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let outbox = transport.outbox.lock().await;
        let response = outbox.iter().find(|m| m["id"] == serde_json::json!(2)).unwrap();
        assert!(response["result"]["contents"][0]["text"]
            .as_str()
            .unwrap()
            .contains("hello"));
    }
}
