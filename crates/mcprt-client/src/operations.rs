//! Typed wrappers over [`ClientSession`] for every client-initiated method
//! (spec.md §3 "Message catalog", client-to-server half).

use mcprt_engine::RequestOptions;
use mcprt_wire::completion::{CompleteRequest, CompleteResult};
use mcprt_wire::logging::{LogLevel, SetLevelRequest};
use mcprt_wire::prompts::{GetPromptRequest, GetPromptResult, ListPromptsRequest, ListPromptsResult};
use mcprt_wire::resources::{
    ListResourceTemplatesRequest, ListResourceTemplatesResult, ListResourcesRequest,
    ListResourcesResult, ReadResourceRequest, ReadResourceResult, SubscribeRequest,
    UnsubscribeRequest,
};
use mcprt_wire::tools::{CallToolRequest, CallToolResult, ListToolsRequest, ListToolsResult};

use crate::error::{ClientError, ClientResult};
use crate::session::ClientSession;

fn to_params<T: serde::Serialize>(value: &T) -> ClientResult<Option<serde_json::Value>> {
    Ok(Some(
        serde_json::to_value(value).map_err(|e| ClientError::Malformed(e.to_string()))?,
    ))
}

fn from_result<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> ClientResult<T> {
    serde_json::from_value(value).map_err(|e| ClientError::Malformed(e.to_string()))
}

impl ClientSession {
    async fn call_typed<P: serde::Serialize, R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
    ) -> ClientResult<R> {
        let params = to_params(params)?;
        let result = self
            .engine
            .call(method, params, RequestOptions::default())
            .await
            .map_err(ClientError::Engine)?;
        from_result(result)
    }

    pub async fn list_tools(&self, cursor: Option<String>) -> ClientResult<ListToolsResult> {
        let result: ListToolsResult = self
            .call_typed("tools/list", &ListToolsRequest { cursor })
            .await?;
        self.schema_cache.populate(
            &self.schema_cache_key(),
            result
                .tools
                .iter()
                .map(|t| (t.name.clone(), t.output_schema.clone())),
        );
        Ok(result)
    }

    /// Call a tool and, if the server declared an `outputSchema` for it,
    /// validate `structuredContent` against that cached schema before
    /// returning (spec.md §4.I "Tool-output validation").
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<std::collections::HashMap<String, serde_json::Value>>,
    ) -> ClientResult<CallToolResult> {
        let name = name.into();
        let result: CallToolResult = self
            .call_typed(
                "tools/call",
                &CallToolRequest {
                    name: name.clone(),
                    arguments,
                },
            )
            .await?;

        if !result.is_error() {
            if let Some(schema) = self.schema_cache.get(&self.schema_cache_key(), &name) {
                let Some(structured) = &result.structured_content else {
                    return Err(ClientError::InvalidRequest(format!(
                        "tool {name} declared an outputSchema but the result carries no structuredContent"
                    )));
                };
                let schema_value = serde_json::to_value(&schema)
                    .map_err(|e| ClientError::Malformed(e.to_string()))?;
                mcprt_schema::validate(&schema_value, structured).map_err(|errors| {
                    ClientError::InvalidParams(format!(
                        "structuredContent for tool {name} failed schema validation: {errors}"
                    ))
                })?;
            }
        }
        Ok(result)
    }

    pub async fn list_resources(&self, cursor: Option<String>) -> ClientResult<ListResourcesResult> {
        self.call_typed("resources/list", &ListResourcesRequest { cursor }).await
    }

    pub async fn list_resource_templates(
        &self,
        cursor: Option<String>,
    ) -> ClientResult<ListResourceTemplatesResult> {
        self.call_typed(
            "resources/templates/list",
            &ListResourceTemplatesRequest { cursor },
        )
        .await
    }

    pub async fn read_resource(&self, uri: impl Into<String>) -> ClientResult<ReadResourceResult> {
        self.call_typed("resources/read", &ReadResourceRequest { uri: uri.into() })
            .await
    }

    pub async fn subscribe(&self, uri: impl Into<String>) -> ClientResult<()> {
        let _: mcprt_wire::core::EmptyResult = self
            .call_typed("resources/subscribe", &SubscribeRequest { uri: uri.into() })
            .await?;
        Ok(())
    }

    pub async fn unsubscribe(&self, uri: impl Into<String>) -> ClientResult<()> {
        let _: mcprt_wire::core::EmptyResult = self
            .call_typed(
                "resources/unsubscribe",
                &UnsubscribeRequest { uri: uri.into() },
            )
            .await?;
        Ok(())
    }

    pub async fn list_prompts(&self, cursor: Option<String>) -> ClientResult<ListPromptsResult> {
        self.call_typed("prompts/list", &ListPromptsRequest { cursor }).await
    }

    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: Option<std::collections::HashMap<String, String>>,
    ) -> ClientResult<GetPromptResult> {
        self.call_typed(
            "prompts/get",
            &GetPromptRequest {
                name: name.into(),
                arguments,
            },
        )
        .await
    }

    pub async fn complete(&self, request: CompleteRequest) -> ClientResult<CompleteResult> {
        self.call_typed("completion/complete", &request).await
    }

    pub async fn set_log_level(&self, level: LogLevel) -> ClientResult<()> {
        let _: mcprt_wire::core::EmptyResult = self
            .call_typed("logging/setLevel", &SetLevelRequest { level })
            .await?;
        Ok(())
    }

    pub async fn ping(&self) -> ClientResult<()> {
        let _: mcprt_wire::core::EmptyResult = self
            .call_typed("ping", &mcprt_wire::ping::PingRequest::default())
            .await?;
        Ok(())
    }
}
