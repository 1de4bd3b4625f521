//! Wire types: the JSON-RPC 2.0 envelope and the MCP message catalog built
//! on top of it.
//!
//! This crate has no opinion about transport, session state, or validation
//! beyond what `serde` gives it for free — that's [`mcprt_schema`],
//! [`mcprt_transport`], and [`mcprt_engine`]. Everything here is a plain
//! data type meant to serialize to exactly what the protocol says it
//! should.

pub mod capabilities;
pub mod completion;
pub mod content;
pub mod core;
pub mod elicitation;
pub mod error;
pub mod ids;
pub mod initialization;
pub mod jsonrpc;
pub mod logging;
pub mod messages;
pub mod ping;
pub mod prompts;
pub mod resources;
pub mod roots;
pub mod sampling;
pub mod tools;

pub use capabilities::{
    ClientCapabilities, CompletionsCapability, ElicitationCapability, LoggingCapability,
    PromptsCapability, ResourcesCapability, RootsCapability, SamplingCapability,
    ServerCapabilities, ToolsCapability,
};
pub use content::{AudioContent, ContentBlock, EmbeddedResourceContent, ImageContent,
    ResourceContent, ResourceLinkContent, TextContent};
pub use core::{Annotations, BaseMetadata, EmptyResult, Implementation, Role};
pub use error::McpError;
pub use ids::{Cursor, ProgressToken, RequestId, ResponseId};
pub use initialization::{
    is_supported_version, negotiate_server_version, InitializeRequest, InitializeResult,
    LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
pub use jsonrpc::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, JsonRpcResponsePayload, JsonRpcVersion, JSONRPC_VERSION,
};
pub use ping::{InitializedNotification, PingRequest};
