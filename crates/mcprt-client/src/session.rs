//! Client role (spec.md §4.G "Client role"): drives the `initialize`
//! handshake, negotiates protocol version and capabilities, and wires the
//! engine's capability gate to the two capability sets exchanged during
//! that handshake.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use mcprt_engine::{
    CapabilityGate, Engine, EngineConfig, EngineHandle, Handler, RequestContext, RequestOptions,
};
use mcprt_schema::ToolOutputSchemaCache;
use mcprt_transport::Transport;
use mcprt_wire::capabilities::{
    required_client_capability, required_server_capability, ClientCapabilities,
    ServerCapabilities,
};
use mcprt_wire::core::Implementation;
use mcprt_wire::elicitation::ElicitRequest;
use mcprt_wire::error::McpError;
use mcprt_wire::initialization::{
    is_supported_version, InitializeRequest, InitializeResult, LATEST_PROTOCOL_VERSION,
};
use mcprt_wire::roots::ListRootsRequest;
use mcprt_wire::sampling::CreateMessageRequest;

use crate::error::{ClientError, ClientResult};
use crate::handlers::HandlerRegistry;

/// The capability gate for a client session: `local` is what we
/// advertised (governs inbound `sampling`/`elicitation`/`roots`
/// dispatch), `peer` is what the server advertised back (governs our
/// outbound `resources`/`prompts`/`tools`/... calls).
struct ClientGate {
    local: ClientCapabilities,
    peer: RwLock<ServerCapabilities>,
}

impl CapabilityGate for ClientGate {
    fn required(&self, method: &str) -> Option<&'static str> {
        required_client_capability(method).or_else(|| required_server_capability(method))
    }

    fn local_satisfies(&self, cap: &str) -> bool {
        self.local.satisfies(cap)
    }

    fn peer_satisfies(&self, cap: &str) -> bool {
        self.peer.read().satisfies(cap)
    }
}

struct SamplingHandlerAdapter(Arc<dyn crate::handlers::SamplingHandler>);

#[async_trait]
impl Handler for SamplingHandlerAdapter {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        let request: CreateMessageRequest = serde_json::from_value(params.unwrap_or_default())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        let result = self.0.create_message(request).await?;
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

struct ElicitationHandlerAdapter(Arc<dyn crate::handlers::ElicitationHandler>);

#[async_trait]
impl Handler for ElicitationHandlerAdapter {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        let request: ElicitRequest = serde_json::from_value(params.unwrap_or_default())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        let result = self.0.elicit(request).await?;
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

struct RootsHandlerAdapter(Arc<dyn crate::handlers::RootsHandler>);

#[async_trait]
impl Handler for RootsHandlerAdapter {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, McpError> {
        let request: ListRootsRequest = match params {
            Some(v) => serde_json::from_value(v).map_err(|e| McpError::InvalidParams(e.to_string()))?,
            None => ListRootsRequest::default(),
        };
        let result = self.0.list_roots(request).await?;
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

/// Builds a [`ClientSession`]: set the identity, capabilities, and
/// server-initiated-request handlers up front, then hand it a transport.
pub struct ClientSessionBuilder {
    client_info: Implementation,
    capabilities: ClientCapabilities,
    handlers: HandlerRegistry,
    engine_config: EngineConfig,
}

impl ClientSessionBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            client_info: Implementation::new(name, version),
            capabilities: ClientCapabilities::default(),
            handlers: HandlerRegistry::default(),
            engine_config: EngineConfig::default(),
        }
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Register a sampling handler and advertise the `sampling` capability.
    /// Without this, a server's `sampling/createMessage` request is
    /// refused before it reaches this process at all (spec.md §8
    /// invariant 4).
    pub fn with_sampling_handler(mut self, handler: Arc<dyn crate::handlers::SamplingHandler>) -> Self {
        self.capabilities.sampling = Some(Default::default());
        self.handlers.sampling = Some(handler);
        self
    }

    pub fn with_elicitation_handler(
        mut self,
        handler: Arc<dyn crate::handlers::ElicitationHandler>,
    ) -> Self {
        self.capabilities.elicitation = Some(Default::default());
        self.handlers.elicitation = Some(handler);
        self
    }

    pub fn with_roots_handler(
        mut self,
        handler: Arc<dyn crate::handlers::RootsHandler>,
        list_changed: bool,
    ) -> Self {
        self.capabilities.roots = Some(mcprt_wire::capabilities::RootsCapability {
            list_changed: Some(list_changed),
        });
        self.handlers.roots = Some(handler);
        self
    }

    /// Perform the `initialize`/`initialized` handshake over `transport`
    /// and return a ready-to-use session (spec.md §3 "Lifecycle").
    pub async fn connect(self, transport: Arc<dyn Transport>) -> ClientResult<ClientSession> {
        let session_id = transport.session_id();
        let engine = Engine::new(transport.clone(), self.engine_config);

        let gate = Arc::new(ClientGate {
            local: self.capabilities.clone(),
            peer: RwLock::new(ServerCapabilities::default()),
        });
        engine.set_capability_gate(gate.clone());

        if let Some(handler) = self.handlers.sampling.clone() {
            engine.register_handler(
                "sampling/createMessage",
                Arc::new(SamplingHandlerAdapter(handler)),
            );
        }
        if let Some(handler) = self.handlers.elicitation.clone() {
            engine.register_handler(
                "elicitation/create",
                Arc::new(ElicitationHandlerAdapter(handler)),
            );
        }
        if let Some(handler) = self.handlers.roots.clone() {
            engine.register_handler("roots/list", Arc::new(RootsHandlerAdapter(handler)));
        }

        engine.start().await.map_err(ClientError::Engine)?;

        let request = InitializeRequest {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: self.capabilities,
            client_info: self.client_info,
        };
        let params = serde_json::to_value(&request).map_err(|e| ClientError::Malformed(e.to_string()))?;
        let result = engine
            .call("initialize", Some(params), RequestOptions::default())
            .await
            .map_err(ClientError::Engine)?;
        let init_result: InitializeResult =
            serde_json::from_value(result).map_err(|e| ClientError::Malformed(e.to_string()))?;

        if !is_supported_version(&init_result.protocol_version) {
            return Err(ClientError::UnsupportedProtocolVersion(
                init_result.protocol_version,
            ));
        }
        *gate.peer.write() = init_result.capabilities.clone();
        transport
            .set_protocol_version(&init_result.protocol_version)
            .await;

        engine
            .notify("notifications/initialized", None)
            .await
            .map_err(ClientError::Engine)?;

        debug!(
            server = %init_result.server_info.name,
            version = %init_result.protocol_version,
            "client handshake complete"
        );

        Ok(ClientSession {
            engine,
            server_info: init_result.server_info,
            server_capabilities: init_result.capabilities,
            protocol_version: init_result.protocol_version,
            instructions: init_result.instructions,
            schema_cache: Arc::new(ToolOutputSchemaCache::new()),
            session_id,
        })
    }
}

/// A live, initialized connection to an MCP server.
pub struct ClientSession {
    pub(crate) engine: EngineHandle,
    server_info: Implementation,
    server_capabilities: ServerCapabilities,
    protocol_version: String,
    instructions: Option<String>,
    pub(crate) schema_cache: Arc<ToolOutputSchemaCache>,
    session_id: Option<String>,
}

impl ClientSession {
    pub fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    pub fn server_capabilities(&self) -> &ServerCapabilities {
        &self.server_capabilities
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    /// The key under which [`Self::schema_cache`] stores this session's
    /// tool output schemas: the transport's session id if it has one
    /// (streamable-HTTP), or a fixed key for transports with exactly one
    /// session per process (stdio).
    fn cache_key(&self) -> &str {
        self.session_id.as_deref().unwrap_or("stdio")
    }

    pub(crate) fn schema_cache_key(&self) -> String {
        self.cache_key().to_string()
    }

    pub async fn close(&self) -> ClientResult<()> {
        self.schema_cache.clear_session(self.cache_key());
        self.engine.close().await.map_err(ClientError::Engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcprt_wire::sampling::CreateMessageResult;
    use mcprt_wire::content::ContentBlock;
    use mcprt_wire::core::Role;
    use mcprt_transport::{TransportEvent, TransportResult};
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

    struct EchoSampling;

    #[async_trait]
    impl crate::handlers::SamplingHandler for EchoSampling {
        async fn create_message(
            &self,
            _request: CreateMessageRequest,
        ) -> Result<CreateMessageResult, McpError> {
            Ok(CreateMessageResult {
                role: Role::Assistant,
                content: ContentBlock::text("echo"),
                model: "test-model".to_string(),
                stop_reason: None,
            })
        }
    }

    #[tokio::test]
    async fn handshake_negotiates_version_and_capabilities() {
        let transport = LoopbackTransport::new();
        let transport_dyn: Arc<dyn Transport> = transport.clone();

        let connect = tokio::spawn({
            let transport_dyn = transport_dyn.clone();
            async move {
                ClientSessionBuilder::new("test-client", "0.1.0")
                    .with_sampling_handler(Arc::new(EchoSampling))
                    .connect(transport_dyn)
                    .await
            }
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let request_id = {
            let outbox = transport.outbox.lock().await;
            assert_eq!(outbox[0]["method"], serde_json::json!("initialize"));
            outbox[0]["id"].clone()
        };

        transport
            .push(serde_json::json!({
                "jsonrpc": "2.0",
                "id": request_id,
                "result": {
                    "protocolVersion": "2025-06-18",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "test-server", "version": "1.0"}
                }
            }))
            .await;

        let session = connect.await.unwrap().unwrap();
        assert_eq!(session.server_info().name, "test-server");
        assert_eq!(session.protocol_version(), "2025-06-18");
        assert!(session.server_capabilities().tools.is_some());

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let outbox = transport.outbox.lock().await;
        assert!(outbox
            .iter()
            .any(|m| m["method"] == serde_json::json!("notifications/initialized")));
    }

    #[tokio::test]
    async fn rejects_unsupported_protocol_version() {
        let transport = LoopbackTransport::new();
        let transport_dyn: Arc<dyn Transport> = transport.clone();

        let connect = tokio::spawn({
            let transport_dyn = transport_dyn.clone();
            async move { ClientSessionBuilder::new("test-client", "0.1.0").connect(transport_dyn).await }
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let request_id = transport.outbox.lock().await[0]["id"].clone();
        transport
            .push(serde_json::json!({
                "jsonrpc": "2.0",
                "id": request_id,
                "result": {
                    "protocolVersion": "1999-01-01",
                    "capabilities": {},
                    "serverInfo": {"name": "ancient-server", "version": "0.0.1"}
                }
            }))
            .await;

        let result = connect.await.unwrap();
        assert!(matches!(result, Err(ClientError::UnsupportedProtocolVersion(_))));
    }
}
