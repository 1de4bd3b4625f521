//! A JSON-Schema subset validator, scoped to what tool `inputSchema` /
//! `outputSchema` objects actually use (spec.md §4.I "Tool-output
//! validation"): `type`, `properties`, `required`, `items`,
//! `additionalProperties`, `enum`, `pattern`, `minimum`/`maximum`,
//! `minLength`/`maxLength`, `minItems`/`maxItems`.
//!
//! This is not a general-purpose JSON-Schema engine — no `$ref`, no
//! `oneOf`/`anyOf`/`allOf`, no `$defs`. Tool schemas are flat, hand-authored
//! shapes; a full draft-2020-12 implementation would be solving a problem
//! nobody here has.

use regex::Regex;
use serde_json::Value;

use crate::error::{SchemaError, SchemaErrors};

/// Validates `instance` against `schema`, collecting every violation rather
/// than stopping at the first one.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), SchemaErrors> {
    let mut errors = Vec::new();
    check(schema, instance, "$", &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaErrors(errors))
    }
}

fn check(schema: &Value, instance: &Value, path: &str, errors: &mut Vec<SchemaError>) {
    let Some(schema_obj) = schema.as_object() else {
        return;
    };

    if let Some(Value::String(ty)) = schema_obj.get("type") {
        if !matches_type(ty, instance) {
            errors.push(SchemaError::new(
                path,
                format!("expected type \"{ty}\", got {}", type_name(instance)),
            ));
            return;
        }
    }

    if let Some(Value::Array(allowed)) = schema_obj.get("enum") {
        if !allowed.contains(instance) {
            errors.push(SchemaError::new(path, "value not in enum"));
        }
    }

    match instance {
        Value::Object(instance_obj) => {
            check_object(schema_obj, instance_obj, path, errors);
        }
        Value::Array(items) => {
            check_array(schema_obj, items, path, errors);
        }
        Value::String(s) => {
            check_string(schema_obj, s, path, errors);
        }
        Value::Number(n) => {
            check_number(schema_obj, n, path, errors);
        }
        _ => {}
    }
}

fn matches_type(ty: &str, instance: &Value) -> bool {
    match ty {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "number" => instance.is_number(),
        "integer" => instance.as_i64().is_some() || instance.as_u64().is_some(),
        _ => true,
    }
}

fn type_name(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_object(
    schema_obj: &serde_json::Map<String, Value>,
    instance_obj: &serde_json::Map<String, Value>,
    path: &str,
    errors: &mut Vec<SchemaError>,
) {
    if let Some(Value::Array(required)) = schema_obj.get("required") {
        for name in required {
            if let Value::String(name) = name {
                if !instance_obj.contains_key(name) {
                    errors.push(SchemaError::new(
                        format!("{path}.{name}"),
                        "missing required property",
                    ));
                }
            }
        }
    }

    let properties = schema_obj
        .get("properties")
        .and_then(Value::as_object);

    if let Some(properties) = properties {
        for (name, sub_schema) in properties {
            if let Some(sub_instance) = instance_obj.get(name) {
                check(sub_schema, sub_instance, &format!("{path}.{name}"), errors);
            }
        }
    }

    if let Some(Value::Bool(false)) = schema_obj.get("additionalProperties") {
        let known: std::collections::HashSet<&str> = properties
            .map(|p| p.keys().map(String::as_str).collect())
            .unwrap_or_default();
        for name in instance_obj.keys() {
            if !known.contains(name.as_str()) {
                errors.push(SchemaError::new(
                    format!("{path}.{name}"),
                    "additional property not allowed",
                ));
            }
        }
    }
}

fn check_array(
    schema_obj: &serde_json::Map<String, Value>,
    items: &[Value],
    path: &str,
    errors: &mut Vec<SchemaError>,
) {
    if let Some(min) = schema_obj.get("minItems").and_then(Value::as_u64) {
        if (items.len() as u64) < min {
            errors.push(SchemaError::new(
                path,
                format!("expected at least {min} items, got {}", items.len()),
            ));
        }
    }
    if let Some(max) = schema_obj.get("maxItems").and_then(Value::as_u64) {
        if (items.len() as u64) > max {
            errors.push(SchemaError::new(
                path,
                format!("expected at most {max} items, got {}", items.len()),
            ));
        }
    }
    if let Some(item_schema) = schema_obj.get("items") {
        for (i, item) in items.iter().enumerate() {
            check(item_schema, item, &format!("{path}[{i}]"), errors);
        }
    }
}

fn check_string(
    schema_obj: &serde_json::Map<String, Value>,
    s: &str,
    path: &str,
    errors: &mut Vec<SchemaError>,
) {
    if let Some(min) = schema_obj.get("minLength").and_then(Value::as_u64) {
        if (s.chars().count() as u64) < min {
            errors.push(SchemaError::new(path, format!("shorter than minLength {min}")));
        }
    }
    if let Some(max) = schema_obj.get("maxLength").and_then(Value::as_u64) {
        if (s.chars().count() as u64) > max {
            errors.push(SchemaError::new(path, format!("longer than maxLength {max}")));
        }
    }
    if let Some(Value::String(pattern)) = schema_obj.get("pattern") {
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(s) {
                    errors.push(SchemaError::new(
                        path,
                        format!("does not match pattern {pattern}"),
                    ));
                }
            }
            Err(_) => {
                // An unusable pattern in the schema itself is a schema
                // authoring bug, not an instance violation.
                errors.push(SchemaError::new(path, format!("schema pattern is not a valid regex: {pattern}")));
            }
        }
    }
}

fn check_number(
    schema_obj: &serde_json::Map<String, Value>,
    n: &serde_json::Number,
    path: &str,
    errors: &mut Vec<SchemaError>,
) {
    let Some(value) = n.as_f64() else { return };
    if let Some(min) = schema_obj.get("minimum").and_then(Value::as_f64) {
        if value < min {
            errors.push(SchemaError::new(path, format!("below minimum {min}")));
        }
    }
    if let Some(max) = schema_obj.get("maximum").and_then(Value::as_f64) {
        if value > max {
            errors.push(SchemaError::new(path, format!("above maximum {max}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_matching_object() {
        let schema = json!({
            "type": "object",
            "properties": {"count": {"type": "integer", "minimum": 0}},
            "required": ["count"]
        });
        let instance = json!({"count": 3});
        assert!(validate(&schema, &instance).is_ok());
    }

    #[test]
    fn reports_missing_required_property() {
        let schema = json!({"type": "object", "required": ["name"]});
        let instance = json!({});
        let err = validate(&schema, &instance).unwrap_err();
        assert!(err.0.iter().any(|e| e.path == "$.name"));
    }

    #[test]
    fn rejects_additional_properties_when_disallowed() {
        let schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "additionalProperties": false
        });
        let instance = json!({"name": "a", "extra": 1});
        let err = validate(&schema, &instance).unwrap_err();
        assert!(err.0.iter().any(|e| e.path == "$.extra"));
    }

    #[test]
    fn integer_type_rejects_floats() {
        let schema = json!({"type": "integer"});
        let instance = json!(1.5);
        assert!(validate(&schema, &instance).is_err());
    }

    #[test]
    fn validates_nested_array_items() {
        let schema = json!({
            "type": "array",
            "items": {"type": "string", "minLength": 1}
        });
        let instance = json!(["ok", ""]);
        let err = validate(&schema, &instance).unwrap_err();
        assert!(err.0.iter().any(|e| e.path == "$[1]"));
    }

    #[test]
    fn enum_rejects_values_outside_the_set() {
        let schema = json!({"enum": ["a", "b"]});
        let instance = json!("c");
        assert!(validate(&schema, &instance).is_err());
    }
}
