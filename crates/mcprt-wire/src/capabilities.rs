//! Capability negotiation types (spec.md §3 "Capability descriptors").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Capabilities a client advertises during `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<ElicitationCapability>,
}

/// Capabilities a server advertises during `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<CompletionsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RootsCapability {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SamplingCapability {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ElicitationCapability {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingCapability {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompletionsCapability {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptsCapability {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourcesCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// The method-to-capability gating table from spec.md §4.F/§4.G ("Gating
/// rules"). `None` means the method requires no capability (always allowed
/// once the session is operational).
pub fn required_client_capability(method: &str) -> Option<&'static str> {
    match method {
        "sampling/createMessage" => Some("sampling"),
        "elicitation/create" => Some("elicitation"),
        "roots/list" => Some("roots"),
        _ => None,
    }
}

pub fn required_server_capability(method: &str) -> Option<&'static str> {
    match method {
        "resources/list" | "resources/templates/list" | "resources/read" => Some("resources"),
        "resources/subscribe" | "resources/unsubscribe" => Some("resources.subscribe"),
        "prompts/list" | "prompts/get" => Some("prompts"),
        "tools/list" | "tools/call" => Some("tools"),
        "logging/setLevel" => Some("logging"),
        "completion/complete" => Some("completions"),
        _ => None,
    }
}

impl ClientCapabilities {
    /// Does this capability set satisfy `capability`, per the dotted paths
    /// used by [`required_client_capability`]?
    pub fn satisfies(&self, capability: &str) -> bool {
        match capability {
            "sampling" => self.sampling.is_some(),
            "elicitation" => self.elicitation.is_some(),
            "roots" => self.roots.is_some(),
            _ => true,
        }
    }
}

impl ServerCapabilities {
    pub fn satisfies(&self, capability: &str) -> bool {
        match capability {
            "resources" => self.resources.is_some(),
            "resources.subscribe" => self.resources.as_ref().is_some_and(|r| r.subscribe == Some(true)),
            "prompts" => self.prompts.is_some(),
            "tools" => self.tools.is_some(),
            "logging" => self.logging.is_some(),
            "completions" => self.completions.is_some(),
            _ => true,
        }
    }
}
