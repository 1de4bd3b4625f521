//! Tool/resource/resource-template/prompt registries (spec.md §4.G "Server
//! role"): name/uri → {metadata, handler} tables a [`crate::session::ServerSessionBuilder`]
//! is populated with before serving any connection.
//!
//! Registries are held behind `Arc<DashMap<..>>` so a [`crate::session::ServerSessionBuilder`]
//! can be cloned cheaply into a [`mcprt_http::SessionFactory`] closure while
//! every session built from it still shares one underlying tool set — the
//! same logical server, reachable from many simultaneous client connections.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use mcprt_engine::RequestContext;
use mcprt_wire::completion::{CompleteRequest, CompletionData};
use mcprt_wire::error::McpError;
use mcprt_wire::prompts::{GetPromptResult, Prompt, PromptMessage};
use mcprt_wire::resources::{Resource, ResourceTemplate};
use mcprt_wire::tools::{CallToolResult, Tool};

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(
        &self,
        arguments: Option<HashMap<String, Value>>,
        ctx: RequestContext,
    ) -> Result<CallToolResult, McpError>;
}

#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(&self, ctx: RequestContext) -> Result<mcprt_wire::resources::ReadResourceResult, McpError>;
}

#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn get(
        &self,
        arguments: Option<HashMap<String, String>>,
        ctx: RequestContext,
    ) -> Result<GetPromptResult, McpError>;
}

#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn complete(&self, request: CompleteRequest, ctx: RequestContext) -> Result<CompletionData, McpError>;
}

pub(crate) struct ToolEntry {
    pub tool: Tool,
    pub handler: Arc<dyn ToolHandler>,
}

pub(crate) struct ResourceEntry {
    pub resource: Resource,
    pub handler: Arc<dyn ResourceHandler>,
}

pub(crate) struct PromptEntry {
    pub prompt: Prompt,
    pub handler: Arc<dyn PromptHandler>,
}

/// The shared tool/resource/prompt tables behind a running server. Cheap to
/// clone: every field is an `Arc`, so a clone shares state with the
/// original rather than copying it (spec.md §4.G supplement: "registries
/// emit `list_changed` notifications through the engine's debounce path").
#[derive(Clone, Default)]
pub struct Registries {
    pub(crate) tools: Arc<DashMap<String, ToolEntry>>,
    pub(crate) resources: Arc<DashMap<String, ResourceEntry>>,
    pub(crate) resource_templates: Arc<DashMap<String, ResourceTemplate>>,
    pub(crate) prompts: Arc<DashMap<String, PromptEntry>>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tool(&self, tool: Tool, handler: Arc<dyn ToolHandler>) {
        self.tools.insert(tool.name.clone(), ToolEntry { tool, handler });
    }

    pub fn remove_tool(&self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn insert_resource(&self, resource: Resource, handler: Arc<dyn ResourceHandler>) {
        self.resources
            .insert(resource.uri.clone(), ResourceEntry { resource, handler });
    }

    pub fn remove_resource(&self, uri: &str) -> bool {
        self.resources.remove(uri).is_some()
    }

    pub fn insert_resource_template(&self, template: ResourceTemplate) {
        self.resource_templates
            .insert(template.uri_template.clone(), template);
    }

    pub fn insert_prompt(&self, prompt: Prompt, handler: Arc<dyn PromptHandler>) {
        self.prompts.insert(prompt.name.clone(), PromptEntry { prompt, handler });
    }

    pub fn remove_prompt(&self, name: &str) -> bool {
        self.prompts.remove(name).is_some()
    }

    pub fn tools_snapshot(&self) -> Vec<Tool> {
        self.tools.iter().map(|e| e.tool.clone()).collect()
    }

    pub fn resources_snapshot(&self) -> Vec<Resource> {
        self.resources.iter().map(|e| e.resource.clone()).collect()
    }

    pub fn resource_templates_snapshot(&self) -> Vec<ResourceTemplate> {
        self.resource_templates.iter().map(|e| e.clone()).collect()
    }

    pub fn prompts_snapshot(&self) -> Vec<Prompt> {
        self.prompts.iter().map(|e| e.prompt.clone()).collect()
    }
}

/// Builds a `role/name` prompt message pair for a resource-backed prompt
/// result — a small convenience kept out of the wire crate since it is
/// specific to how a [`PromptHandler`] chooses to assemble its reply.
pub fn single_assistant_message(text: impl Into<String>) -> PromptMessage {
    PromptMessage {
        role: mcprt_wire::core::Role::Assistant,
        content: mcprt_wire::content::ContentBlock::text(text),
    }
}
