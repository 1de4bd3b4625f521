use mcprt_wire::{
    initialization::{InitializeRequest, InitializeResult},
    tools::{CallToolRequest, CallToolResult, Tool},
    ClientCapabilities, Implementation, RequestId, ServerCapabilities, LATEST_PROTOCOL_VERSION,
};
use pretty_assertions::assert_eq;

#[test]
fn initialize_request_round_trips_through_json() {
    let req = InitializeRequest {
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation::new("demo-client", "0.1.0"),
    };
    let text = serde_json::to_string(&req).unwrap();
    let back: InitializeRequest = serde_json::from_str(&text).unwrap();
    assert_eq!(back.protocol_version, LATEST_PROTOCOL_VERSION);
    assert_eq!(back.client_info.name, "demo-client");
}

#[test]
fn initialize_result_omits_absent_instructions() {
    let result = InitializeResult {
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities::default(),
        server_info: Implementation::new("demo-server", "0.1.0"),
        instructions: None,
    };
    let value = serde_json::to_value(&result).unwrap();
    assert!(value.get("instructions").is_none());
}

#[test]
fn call_tool_request_round_trips() {
    let mut arguments = std::collections::HashMap::new();
    arguments.insert("text".to_string(), serde_json::json!("hi"));
    let req = CallToolRequest {
        name: "echo".into(),
        arguments: Some(arguments),
    };
    let text = serde_json::to_string(&req).unwrap();
    let back: CallToolRequest = serde_json::from_str(&text).unwrap();
    assert_eq!(back.name, "echo");
}

#[test]
fn call_tool_result_text_helper_is_not_an_error() {
    let result = CallToolResult::text("done");
    assert!(!result.is_error());
}

#[test]
fn tool_definition_round_trips_with_output_schema() {
    let tool = Tool::new("echo").with_description("echoes input back");
    let text = serde_json::to_string(&tool).unwrap();
    let back: Tool = serde_json::from_str(&text).unwrap();
    assert_eq!(back.name, "echo");
    assert_eq!(back.description.as_deref(), Some("echoes input back"));
}

#[test]
fn request_id_accepts_both_string_and_number_forms() {
    let numeric: RequestId = serde_json::from_str("42").unwrap();
    let textual: RequestId = serde_json::from_str("\"abc\"").unwrap();
    assert_eq!(numeric, RequestId::Number(42));
    assert_eq!(textual, RequestId::String("abc".to_string()));
}
