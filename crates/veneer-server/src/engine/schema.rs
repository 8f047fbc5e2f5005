//! Request-body validation against a JSON-Schema (Draft 7 subset).
//!
//! Numeric strings satisfy `integer`/`number` and the strings "true"/"false"
//! satisfy `boolean`, matching the leniency of form-ish clients.

use crate::config::BodySchema;
use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("{0}")]
pub struct SchemaError(pub String);

/// Recursively validate `data` against `schema`. `path` names the location in
/// error messages, e.g. "request.body.items[2].price".
pub fn validate(schema: &BodySchema, data: &Value, path: &str) -> Result<(), SchemaError> {
    let path = if path.is_empty() { "root" } else { path };

    if let Some(expected) = schema.schema_type.as_deref() {
        validate_type(expected, data, path)?;
    }

    if data.is_null() {
        return Ok(());
    }

    match schema.schema_type.as_deref() {
        Some("object") => {
            let Some(map) = data.as_object() else {
                return Err(SchemaError(format!("{path}: expected object")));
            };
            validate_object(schema, map, path)
        }

        Some("array") => {
            let Some(items) = data.as_array() else {
                return Err(SchemaError(format!("{path}: expected array")));
            };
            validate_array(schema, items, path)
        }

        Some("string") => {
            let value = data.as_str().unwrap_or_default();
            if let Some(min) = schema.min_length {
                if value.len() < min {
                    return Err(SchemaError(format!("{path}: length must be >= {min}")));
                }
            }
            if let Some(max) = schema.max_length {
                if value.len() > max {
                    return Err(SchemaError(format!("{path}: length must be <= {max}")));
                }
            }
            if !schema.pattern.is_empty() {
                let matched = regex::Regex::new(&schema.pattern)
                    .map(|re| re.is_match(value))
                    .unwrap_or(false);
                if !matched {
                    return Err(SchemaError(format!(
                        "{path}: value does not match pattern '{}'",
                        schema.pattern
                    )));
                }
            }
            if !schema.allowed.is_empty()
                && !schema.allowed.iter().any(|v| v == &Value::String(value.to_string()))
            {
                return Err(SchemaError(format!(
                    "{path}: invalid value '{value}'. allowed: {:?}",
                    schema.allowed
                )));
            }
            Ok(())
        }

        Some("integer") | Some("number") => {
            let numeric = match data {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            if let Some(value) = numeric {
                if let Some(min) = schema.minimum {
                    if value < min {
                        return Err(SchemaError(format!("{path}: must be >= {min}")));
                    }
                }
                if let Some(max) = schema.maximum {
                    if value > max {
                        return Err(SchemaError(format!("{path}: must be <= {max}")));
                    }
                }
            }
            Ok(())
        }

        _ => Ok(()),
    }
}

fn validate_object(
    schema: &BodySchema,
    data: &serde_json::Map<String, Value>,
    parent: &str,
) -> Result<(), SchemaError> {
    for required in &schema.required {
        if !data.contains_key(required) {
            return Err(SchemaError(format!(
                "{parent}: missing required field '{required}'"
            )));
        }
    }

    for (key, value) in data {
        match schema.properties.get(key) {
            Some(prop) => validate(prop, value, &format!("{parent}.{key}"))?,
            None => {
                if schema.additional_properties == Some(false) {
                    return Err(SchemaError(format!(
                        "{parent}: unexpected field '{key}'"
                    )));
                }
            }
        }
    }

    Ok(())
}

fn validate_array(schema: &BodySchema, data: &[Value], parent: &str) -> Result<(), SchemaError> {
    let Some(items) = &schema.items else {
        return Ok(());
    };
    for (i, item) in data.iter().enumerate() {
        validate(items, item, &format!("{parent}[{i}]"))?;
    }
    Ok(())
}

fn validate_type(expected: &str, data: &Value, path: &str) -> Result<(), SchemaError> {
    let got = match data {
        Value::String(s) => {
            if expected == "integer" || expected == "number" {
                if let Ok(f) = s.parse::<f64>() {
                    if expected == "integer" && f.fract() != 0.0 {
                        return Err(SchemaError(format!(
                            "{path}: expected integer (whole number), got float string '{s}'"
                        )));
                    }
                    return Ok(());
                }
            }
            if expected == "boolean" && (s == "true" || s == "false") {
                return Ok(());
            }
            "string"
        }

        Value::Number(n) => {
            if expected == "integer" {
                let f = n.as_f64().unwrap_or_default();
                if f.fract() != 0.0 {
                    return Err(SchemaError(format!("{path}: expected integer, got float")));
                }
                return Ok(());
            }
            if expected == "number" {
                return Ok(());
            }
            "number"
        }

        Value::Bool(_) => "boolean",
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::Null => "null",
    };

    if got != expected {
        return Err(SchemaError(format!(
            "{path}: expected type '{expected}', got '{got}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(raw: Value) -> BodySchema {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_required_fields() {
        let s = schema(json!({
            "type": "object",
            "required": ["id", "name"],
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": "string"}
            }
        }));

        assert!(validate(&s, &json!({"id": 1, "name": "x"}), "request.body").is_ok());
        let err = validate(&s, &json!({"id": 1}), "request.body").unwrap_err();
        assert!(err.0.contains("missing required field 'name'"));
    }

    #[test]
    fn test_type_mismatches() {
        let s = schema(json!({"type": "integer"}));
        assert!(validate(&s, &json!(5), "x").is_ok());
        assert!(validate(&s, &json!(5.5), "x").is_err());
        assert!(validate(&s, &json!("5"), "x").is_ok());
        assert!(validate(&s, &json!("5.5"), "x").is_err());
        assert!(validate(&s, &json!("abc"), "x").is_err());

        let s = schema(json!({"type": "number"}));
        assert!(validate(&s, &json!(5.5), "x").is_ok());
        assert!(validate(&s, &json!("19.99"), "x").is_ok());

        let s = schema(json!({"type": "boolean"}));
        assert!(validate(&s, &json!(true), "x").is_ok());
        assert!(validate(&s, &json!("true"), "x").is_ok());
        assert!(validate(&s, &json!("yes"), "x").is_err());
    }

    #[test]
    fn test_string_constraints() {
        let s = schema(json!({"type": "string", "minLength": 2, "maxLength": 4}));
        assert!(validate(&s, &json!("ab"), "x").is_ok());
        assert!(validate(&s, &json!("a"), "x").is_err());
        assert!(validate(&s, &json!("abcde"), "x").is_err());

        let s = schema(json!({"type": "string", "pattern": "^[a-z]+$"}));
        assert!(validate(&s, &json!("abc"), "x").is_ok());
        assert!(validate(&s, &json!("Abc"), "x").is_err());

        let s = schema(json!({"type": "string", "enum": ["active", "inactive"]}));
        assert!(validate(&s, &json!("active"), "x").is_ok());
        assert!(validate(&s, &json!("gone"), "x").is_err());
    }

    #[test]
    fn test_numeric_bounds() {
        let s = schema(json!({"type": "integer", "minimum": 1, "maximum": 10}));
        assert!(validate(&s, &json!(5), "x").is_ok());
        assert!(validate(&s, &json!(0), "x").is_err());
        assert!(validate(&s, &json!(11), "x").is_err());
    }

    #[test]
    fn test_nested_object_and_array() {
        let s = schema(json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["sku"],
                        "properties": {"sku": {"type": "string"}}
                    }
                }
            }
        }));

        assert!(validate(&s, &json!({"items": [{"sku": "a"}, {"sku": "b"}]}), "request.body").is_ok());
        let err = validate(&s, &json!({"items": [{"sku": "a"}, {}]}), "request.body").unwrap_err();
        assert!(err.0.contains("items[1]"));
    }

    #[test]
    fn test_additional_properties() {
        // Omitted: undeclared keys pass.
        let s = schema(json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}}
        }));
        assert!(validate(&s, &json!({"id": 1, "extra": true}), "x").is_ok());

        // Explicit false: undeclared keys rejected.
        let s = schema(json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {"id": {"type": "integer"}}
        }));
        let err = validate(&s, &json!({"id": 1, "extra": true}), "x").unwrap_err();
        assert!(err.0.contains("unexpected field 'extra'"));
    }
}
