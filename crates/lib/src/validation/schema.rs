//! Built-in validator for a JSON Schema subset.
//!
//! Supported keywords: `type`, `enum`, `const`, `required`, `properties`,
//! `additionalProperties` (boolean or schema), `items`, `minimum`, `maximum`,
//! `minLength`, `maxLength`, `minItems`, `maxItems`, `pattern`. Unknown
//! keywords are ignored. Every violation is collected; validation does not
//! stop at the first one.

use regex::Regex;
use serde_json::{Map, Value};

use super::{FieldErrors, Validator};
use crate::canonical::{canonical_eq, to_canonical_string, value_kind};

/// Structural validator over [`serde_json::Value`] schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, document: &Value, schema: &Value) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check(document, schema, "", &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn report(errors: &mut FieldErrors, path: &str, message: String) {
    errors.entry(path.to_string()).or_default().push(message);
}

fn child_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

fn check(value: &Value, schema: &Value, path: &str, errors: &mut FieldErrors) {
    // `true`, `{}` and non-object schemas accept anything.
    let Some(schema) = schema.as_object() else {
        if schema == &Value::Bool(false) {
            report(errors, path, "is not allowed".to_string());
        }
        return;
    };

    if let Some(expected) = schema.get("type")
        && !type_matches(value, expected)
    {
        report(
            errors,
            path,
            format!(
                "must be of type {}, found {}",
                describe_type(expected),
                value_kind(value)
            ),
        );
        // Further keywords would only restate the type error.
        return;
    }

    if let Some(Value::Array(options)) = schema.get("enum")
        && !options.iter().any(|option| canonical_eq(option, value))
    {
        let allowed: Vec<String> = options.iter().map(to_canonical_string).collect();
        report(
            errors,
            path,
            format!("must be one of {}", allowed.join(", ")),
        );
    }

    if let Some(constant) = schema.get("const")
        && !canonical_eq(constant, value)
    {
        report(
            errors,
            path,
            format!("must equal {}", to_canonical_string(constant)),
        );
    }

    match value {
        Value::Number(n) => {
            if let Some(n) = n.as_f64() {
                check_number(n, schema, path, errors);
            }
        }
        Value::String(s) => check_string(s, schema, path, errors),
        Value::Array(items) => check_array(items, schema, path, errors),
        Value::Object(map) => check_object(map, schema, path, errors),
        Value::Null | Value::Bool(_) => {}
    }
}

fn type_matches(value: &Value, expected: &Value) -> bool {
    match expected {
        Value::String(name) => matches_type_name(value, name),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| matches_type_name(value, name)),
        _ => true,
    }
}

fn matches_type_name(value: &Value, name: &str) -> bool {
    match name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => match value {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        },
        _ => true,
    }
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::String(name) => name.clone(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => to_canonical_string(other),
    }
}

fn bound(schema: &Map<String, Value>, keyword: &str) -> Option<f64> {
    schema.get(keyword).and_then(Value::as_f64)
}

fn count_bound(schema: &Map<String, Value>, keyword: &str) -> Option<usize> {
    schema
        .get(keyword)
        .and_then(Value::as_u64)
        .map(|n| n as usize)
}

fn check_number(n: f64, schema: &Map<String, Value>, path: &str, errors: &mut FieldErrors) {
    if let Some(min) = bound(schema, "minimum")
        && n < min
    {
        report(errors, path, format!("must be at least {min}"));
    }
    if let Some(max) = bound(schema, "maximum")
        && n > max
    {
        report(errors, path, format!("must be at most {max}"));
    }
}

fn check_string(s: &str, schema: &Map<String, Value>, path: &str, errors: &mut FieldErrors) {
    let len = s.chars().count();
    if let Some(min) = count_bound(schema, "minLength")
        && len < min
    {
        report(
            errors,
            path,
            format!("must be at least {min} characters long"),
        );
    }
    if let Some(max) = count_bound(schema, "maxLength")
        && len > max
    {
        report(
            errors,
            path,
            format!("must be at most {max} characters long"),
        );
    }
    if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
        match Regex::new(pattern) {
            Ok(re) if !re.is_match(s) => {
                report(errors, path, format!("must match pattern '{pattern}'"));
            }
            Ok(_) => {}
            Err(e) => report(errors, path, format!("has an invalid pattern: {e}")),
        }
    }
}

fn check_array(items: &[Value], schema: &Map<String, Value>, path: &str, errors: &mut FieldErrors) {
    if let Some(min) = count_bound(schema, "minItems")
        && items.len() < min
    {
        report(errors, path, format!("must contain at least {min} items"));
    }
    if let Some(max) = count_bound(schema, "maxItems")
        && items.len() > max
    {
        report(errors, path, format!("must contain at most {max} items"));
    }
    if let Some(item_schema) = schema.get("items") {
        for (index, item) in items.iter().enumerate() {
            check(item, item_schema, &child_path(path, &index.to_string()), errors);
        }
    }
}

fn check_object(
    map: &Map<String, Value>,
    schema: &Map<String, Value>,
    path: &str,
    errors: &mut FieldErrors,
) {
    if let Some(Value::Array(required)) = schema.get("required") {
        for key in required.iter().filter_map(Value::as_str) {
            if map.get(key).is_none_or(Value::is_null) {
                report(errors, &child_path(path, key), "is required".to_string());
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    if let Some(properties) = properties {
        for (key, property_schema) in properties {
            if let Some(value) = map.get(key) {
                check(value, property_schema, &child_path(path, key), errors);
            }
        }
    }

    match schema.get("additionalProperties") {
        Some(Value::Bool(false)) => {
            for key in map.keys() {
                if !properties.is_some_and(|p| p.contains_key(key)) {
                    report(errors, &child_path(path, key), "is not allowed".to_string());
                }
            }
        }
        Some(extra) if extra.is_object() => {
            for (key, value) in map {
                if !properties.is_some_and(|p| p.contains_key(key)) {
                    check(value, extra, &child_path(path, key), errors);
                }
            }
        }
        _ => {}
    }
}
