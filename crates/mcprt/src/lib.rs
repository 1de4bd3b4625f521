//! # mcprt — Model Context Protocol core runtime
//!
//! A symmetric JSON-RPC 2.0 framework for building MCP hosts and
//! providers: request/response correlation, progress streaming,
//! cancellation and timeouts, capability-gated session handshakes, the
//! stdio and streamable-HTTP transports, and an OAuth 2.1 authorization
//! subsystem for protected servers.
//!
//! This crate is a thin facade: it re-exports the lower layers
//! (`mcprt-wire`, `mcprt-schema`, `mcprt-transport`, `mcprt-engine`,
//! `mcprt-client`, `mcprt-server`, and — behind feature flags —
//! `mcprt-http`/`mcprt-auth`) so a dependent only names one crate. Each
//! layer still ships its own crate for anyone who only needs, say, the
//! wire types without pulling in axum.
//!
//! ## Quick start — a minimal server over stdio
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use mcprt::server::{ServerSessionBuilder, ToolHandler};
//! use mcprt::engine::RequestContext;
//! use mcprt::transport::StdioServerTransport;
//! use mcprt::wire::error::McpError;
//! use mcprt::wire::tools::{CallToolResult, ObjectSchema, Tool};
//! use async_trait::async_trait;
//! use serde_json::Value;
//! use std::collections::HashMap;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ToolHandler for Echo {
//!     async fn call(
//!         &self,
//!         arguments: Option<HashMap<String, Value>>,
//!         _ctx: RequestContext,
//!     ) -> Result<CallToolResult, McpError> {
//!         let text = arguments
//!             .and_then(|a| a.get("text").cloned())
//!             .map(|v| v.to_string())
//!             .unwrap_or_default();
//!         Ok(CallToolResult::text(text))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut schema = ObjectSchema::default();
//!     schema.properties = Some(HashMap::from([(
//!         "text".to_string(),
//!         serde_json::json!({"type": "string"}),
//!     )]));
//!     schema.required = Some(vec!["text".to_string()]);
//!     let tool = Tool::new("echo").with_input_schema(schema);
//!     let handle = ServerSessionBuilder::new("echo-server", "0.1.0")
//!         .with_tool(tool, Arc::new(Echo))
//!         .build();
//!     let transport = Arc::new(StdioServerTransport::new());
//!     handle.serve(transport).await?;
//!     Ok(())
//! }
//! ```

pub use mcprt_client as client;
pub use mcprt_engine as engine;
pub use mcprt_schema as schema;
pub use mcprt_server as server;
pub use mcprt_transport as transport;
pub use mcprt_wire as wire;

#[cfg(feature = "http")]
pub use mcprt_http as http;

#[cfg(feature = "auth")]
pub use mcprt_auth as auth;

pub use async_trait::async_trait;
pub use serde_json;
pub use tokio;
pub use tracing;

/// Re-exports the handful of types almost every caller names directly,
/// mirroring the teacher's `prelude`-style top-level re-export block
/// rather than its macro-heavy `prelude` module (the `#[server]`/`#[tool]`
/// attribute macros are out of scope here — see DESIGN.md).
pub mod prelude {
    pub use mcprt_client::{ClientSession, ClientSessionBuilder};
    pub use mcprt_engine::{Engine, EngineConfig, RequestContext, RequestOptions};
    pub use mcprt_server::{
        PromptHandler, ResourceHandler, ServerHandle, ServerSession, ServerSessionBuilder,
        ToolHandler,
    };
    pub use mcprt_transport::{StdioClientTransport, StdioServerTransport, Transport};
    pub use mcprt_wire::capabilities::{ClientCapabilities, ServerCapabilities};
    pub use mcprt_wire::content::ContentBlock;
    pub use mcprt_wire::error::McpError;
    pub use mcprt_wire::prompts::Prompt;
    pub use mcprt_wire::resources::{Resource, ResourceTemplate};
    pub use mcprt_wire::tools::{CallToolResult, Tool};

    #[cfg(feature = "http")]
    pub use mcprt_http::{HttpConfig, SessionFactory};

    #[cfg(feature = "auth")]
    pub use mcprt_auth::{AuthorizationServer, OAuthConfig};
}
