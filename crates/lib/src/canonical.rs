//! Canonical JSON helpers.
//!
//! Documents are compared by their canonical form: object keys sorted at every
//! level, arrays left in order. Two values are canonically equal when their
//! canonical forms are identical, regardless of the key order they were built
//! or decoded with. Dirty-checking and test assertions rely on this.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced while decoding JSON text.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// Input was not valid JSON
    #[error("Failed to decode JSON: {reason}")]
    Decode { reason: String },
}

impl CanonicalError {
    /// Check if this error came from decoding malformed input
    pub fn is_decode_error(&self) -> bool {
        matches!(self, CanonicalError::Decode { .. })
    }
}

impl From<CanonicalError> for crate::Error {
    fn from(err: CanonicalError) -> Self {
        crate::Error::Canonical(err)
    }
}

/// Returns a copy of `value` with object keys sorted recursively.
///
/// The result does not depend on whether `serde_json` was built with
/// `preserve_order`.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut sorted = Map::new();
            for (key, item) in entries {
                sorted.insert(key.clone(), canonicalize(item));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serializes `value` to compact JSON with sorted object keys.
///
/// ```
/// use docmap::canonical::to_canonical_string;
/// use serde_json::json;
///
/// assert_eq!(to_canonical_string(&json!({"b": 1, "a": [true]})), r#"{"a":[true],"b":1}"#);
/// ```
pub fn to_canonical_string(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// Key-order-independent equality.
pub fn canonical_eq(a: &Value, b: &Value) -> bool {
    to_canonical_string(a) == to_canonical_string(b)
}

/// Decodes JSON text, reporting malformed input as a [`CanonicalError`].
pub fn decode(input: &str) -> Result<Value, CanonicalError> {
    serde_json::from_str(input).map_err(|e| CanonicalError::Decode {
        reason: e.to_string(),
    })
}

/// True for the canonical empty-object form `{}`.
pub fn is_empty_object(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}

/// Short name of a JSON value's kind, used in error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
