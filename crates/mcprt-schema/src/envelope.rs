//! Shape validation for the raw JSON-RPC envelope, run before a message is
//! decoded into the MCP message catalog (spec.md §4.B "Validator").
//!
//! This deliberately checks the envelope as a bag of `serde_json::Value`
//! fields rather than deserializing straight into
//! [`mcprt_wire::JsonRpcMessage`] first: a malformed envelope (missing
//! `id`, both `result` and `error` present, wrong `jsonrpc` string) needs
//! to produce a path-qualified diagnostic, not a generic serde error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{SchemaError, SchemaErrors};

static METHOD_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_/]*$").expect("valid method name regex"));

/// What shape the caller expects the envelope to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Request,
    Notification,
    Response,
}

/// Checks only the envelope's own shape: `jsonrpc`, `method`/`id` presence,
/// and the `result` XOR `error` exclusivity for responses. Does not know
/// about any particular method's params.
pub fn validate_envelope(value: &Value, kind: EnvelopeKind) -> Result<(), SchemaErrors> {
    let mut errors = Vec::new();
    let Some(obj) = value.as_object() else {
        return Err(SchemaErrors(vec![SchemaError::new(
            "$",
            "envelope must be a JSON object",
        )]));
    };

    match obj.get("jsonrpc") {
        Some(Value::String(v)) if v == "2.0" => {}
        Some(_) => errors.push(SchemaError::new("$.jsonrpc", "must be the string \"2.0\"")),
        None => errors.push(SchemaError::new("$.jsonrpc", "missing required field")),
    }

    match kind {
        EnvelopeKind::Request | EnvelopeKind::Notification => {
            validate_method(obj.get("method"), &mut errors);
            if kind == EnvelopeKind::Request && !obj.contains_key("id") {
                errors.push(SchemaError::new("$.id", "missing required field"));
            }
            if kind == EnvelopeKind::Notification && obj.contains_key("id") {
                errors.push(SchemaError::new(
                    "$.id",
                    "notifications must not carry an id",
                ));
            }
        }
        EnvelopeKind::Response => {
            if !obj.contains_key("id") {
                errors.push(SchemaError::new("$.id", "missing required field"));
            }
            let has_result = obj.contains_key("result");
            let has_error = obj.contains_key("error");
            if has_result == has_error {
                errors.push(SchemaError::new(
                    "$",
                    "response must carry exactly one of `result` or `error`",
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaErrors(errors))
    }
}

fn validate_method(method: Option<&Value>, errors: &mut Vec<SchemaError>) {
    match method {
        Some(Value::String(m)) if METHOD_NAME_REGEX.is_match(m) => {}
        Some(Value::String(m)) => errors.push(SchemaError::new(
            "$.method",
            format!("not a valid method name: {m}"),
        )),
        Some(_) => errors.push(SchemaError::new("$.method", "must be a string")),
        None => errors.push(SchemaError::new("$.method", "missing required field")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn accepts_well_formed_request() {
        let value = json!({"jsonrpc": "2.0", "method": "ping", "id": 1});
        assert!(validate_envelope(&value, EnvelopeKind::Request).is_ok());
    }

    #[test]
    fn rejects_request_missing_id() {
        let value = json!({"jsonrpc": "2.0", "method": "ping"});
        let err = validate_envelope(&value, EnvelopeKind::Request).unwrap_err();
        assert!(err.0.iter().any(|e| e.path == "$.id"));
    }

    #[test]
    fn rejects_response_with_both_result_and_error() {
        let value = json!({"jsonrpc": "2.0", "id": 1, "result": {}, "error": {"code": -32600, "message": "x"}});
        let err = validate_envelope(&value, EnvelopeKind::Response).unwrap_err();
        assert_eq!(err.0.len(), 1);
    }

    #[test]
    fn rejects_wrong_jsonrpc_version() {
        let value = json!({"jsonrpc": "1.0", "method": "ping", "id": 1});
        let err = validate_envelope(&value, EnvelopeKind::Request).unwrap_err();
        assert!(err.0.iter().any(|e| e.path == "$.jsonrpc"));
    }

    #[test]
    fn notification_must_not_carry_id() {
        let value = json!({"jsonrpc": "2.0", "method": "notifications/initialized", "id": 1});
        let err = validate_envelope(&value, EnvelopeKind::Notification).unwrap_err();
        assert!(err.0.iter().any(|e| e.path == "$.id"));
    }
}
