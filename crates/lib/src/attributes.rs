//! Typed attribute storage.
//!
//! [`Attributes`] is the key-value store behind every document. It keeps the
//! current values, a snapshot of the values as last loaded or saved (the
//! "original"), and applies the [`Cast`] declared for a key whenever that key
//! is assigned.
//!
//! Values loaded from a host are stored raw. Casting happens on assignment and
//! on typed reads, never on load, so a document can always be hydrated from
//! whatever its host holds.

use std::{collections::BTreeMap, fmt, rc::Rc};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::canonical::{canonical_eq, value_kind};

/// Errors produced by attribute assignment.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AttributeError {
    /// The value could not be coerced into the declared cast
    #[error("Cannot cast attribute '{key}' to {cast}: {reason}")]
    CastFailed {
        key: String,
        cast: String,
        reason: String,
    },
}

impl AttributeError {
    /// Check if this error is a failed cast
    pub fn is_cast_error(&self) -> bool {
        matches!(self, AttributeError::CastFailed { .. })
    }

    /// Get the attribute key associated with this error
    pub fn key(&self) -> &str {
        match self {
            AttributeError::CastFailed { key, .. } => key,
        }
    }
}

impl From<AttributeError> for crate::Error {
    fn from(err: AttributeError) -> Self {
        crate::Error::Attribute(err)
    }
}

/// A user-supplied cast for values the built-in casts do not cover.
pub trait CustomCast {
    /// Name reported in errors and debug output.
    fn name(&self) -> &str;

    /// Coerce `value` into its stored form, or explain why it cannot be.
    fn cast(&self, value: &Value) -> Result<Value, String>;
}

/// Declared coercion policy for one attribute.
#[derive(Clone)]
pub enum Cast {
    Int,
    Float,
    String,
    Bool,
    /// RFC 3339 strings or Unix seconds, stored as RFC 3339 UTC.
    DateTime,
    Custom(Rc<dyn CustomCast>),
}

impl fmt::Debug for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cast({})", self.name())
    }
}

impl Cast {
    /// Looks up a built-in cast by the name used in configuration files.
    pub fn from_name(name: &str) -> Option<Cast> {
        match name {
            "int" | "integer" => Some(Cast::Int),
            "float" | "double" | "real" => Some(Cast::Float),
            "string" => Some(Cast::String),
            "bool" | "boolean" => Some(Cast::Bool),
            "datetime" => Some(Cast::DateTime),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Cast::Int => "int",
            Cast::Float => "float",
            Cast::String => "string",
            Cast::Bool => "bool",
            Cast::DateTime => "datetime",
            Cast::Custom(custom) => custom.name(),
        }
    }

    /// Coerce a value. `null` passes through every cast unchanged.
    pub fn apply(&self, value: &Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match self {
            Cast::Int => cast_int(value),
            Cast::Float => cast_float(value),
            Cast::String => cast_string(value),
            Cast::Bool => cast_bool(value),
            Cast::DateTime => cast_datetime(value),
            Cast::Custom(custom) => custom.cast(value),
        }
    }
}

fn cast_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(f) = n.as_f64()
                && f.fract() == 0.0
                && f >= i64::MIN as f64
                && f <= i64::MAX as f64
            {
                Ok(Value::from(f as i64))
            } else {
                Err(format!("{n} is not an integer"))
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| format!("'{s}' is not an integer: {e}")),
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        other => Err(format!("{} is not an integer", value_kind(other))),
    }
}

fn cast_float(value: &Value) -> Result<Value, String> {
    let f = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("{n} is not a float"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("'{s}' is not a float: {e}"))?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        other => return Err(format!("{} is not a float", value_kind(other))),
    };
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("{f} is not a finite float"))
}

fn cast_string(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        other => Err(format!("{} is not a string", value_kind(other))),
    }
}

fn cast_bool(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(Value::Bool(false)),
            _ => Err(format!("'{s}' is not a boolean")),
        },
        other => Err(format!("{} is not a boolean", value_kind(other))),
    }
}

fn cast_datetime(value: &Value) -> Result<Value, String> {
    let parsed = match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("'{s}' is not an RFC 3339 timestamp: {e}"))?,
        Value::Number(n) => {
            let secs = n
                .as_i64()
                .ok_or_else(|| format!("{n} is not a whole number of seconds"))?;
            DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("{secs} is out of range"))?
        }
        other => return Err(format!("{} is not a timestamp", value_kind(other))),
    };
    Ok(Value::String(
        parsed.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    ))
}

/// Reads `map[attribute]`, or `map[attribute][sub_key]` when a sub key is given.
pub(crate) fn get_segment<'a>(
    map: &'a Map<String, Value>,
    attribute: &str,
    sub_key: Option<&str>,
) -> Option<&'a Value> {
    let value = map.get(attribute)?;
    match sub_key {
        None => Some(value),
        Some(key) => match value {
            Value::Object(inner) => inner.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        },
    }
}

/// Writes a segment, keeping every sibling under `map[attribute]` intact.
///
/// A non-object value at `map[attribute]` is replaced by a new object when a
/// sub key is written into it.
pub(crate) fn set_segment(
    map: &mut Map<String, Value>,
    attribute: &str,
    sub_key: Option<&str>,
    value: Value,
) {
    match sub_key {
        None => {
            map.insert(attribute.to_string(), value);
        }
        Some(key) => {
            let slot = map
                .entry(attribute.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                inner.insert(key.to_string(), value);
            }
        }
    }
}

/// Removes a segment. Siblings under `map[attribute]` are kept.
pub(crate) fn remove_segment(
    map: &mut Map<String, Value>,
    attribute: &str,
    sub_key: Option<&str>,
) -> Option<Value> {
    match sub_key {
        None => map.remove(attribute),
        Some(key) => match map.get_mut(attribute) {
            Some(Value::Object(inner)) => inner.remove(key),
            _ => None,
        },
    }
}

/// Cast-aware attribute map with an original-value snapshot.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    values: Map<String, Value>,
    original: Map<String, Value>,
    casts: Rc<BTreeMap<String, Cast>>,
}

impl Attributes {
    /// Creates an empty store governed by `casts`.
    pub fn new(casts: Rc<BTreeMap<String, Cast>>) -> Self {
        Self {
            values: Map::new(),
            original: Map::new(),
            casts,
        }
    }

    /// Replaces every value without casting. The snapshot is left alone.
    pub fn fill_raw(&mut self, values: Map<String, Value>) {
        self.values = values;
    }

    /// Replaces every value with data loaded from storage and snapshots it.
    pub fn load(&mut self, values: Map<String, Value>) {
        self.values = values;
        self.sync_original();
    }

    /// Raw stored value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Stored value with its cast applied. Falls back to the raw value when
    /// stored data does not satisfy the cast.
    pub fn get_cast(&self, key: &str) -> Option<Value> {
        let raw = self.values.get(key)?;
        match self.casts.get(key) {
            Some(cast) => Some(cast.apply(raw).unwrap_or_else(|_| raw.clone())),
            None => Some(raw.clone()),
        }
    }

    /// Assigns a value, applying the declared cast.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), AttributeError> {
        let value = match self.casts.get(key) {
            Some(cast) => cast
                .apply(&value)
                .map_err(|reason| AttributeError::CastFailed {
                    key: key.to_string(),
                    cast: cast.name().to_string(),
                    reason,
                })?,
            None => value,
        };
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Assigns a value exactly as given.
    pub fn set_raw(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Plain copy of the stored values.
    pub fn to_map(&self) -> Map<String, Value> {
        self.values.clone()
    }

    pub fn segment(&self, attribute: &str, sub_key: Option<&str>) -> Option<&Value> {
        get_segment(&self.values, attribute, sub_key)
    }

    pub fn set_segment(&mut self, attribute: &str, sub_key: Option<&str>, value: Value) {
        set_segment(&mut self.values, attribute, sub_key, value);
    }

    pub fn remove_segment(&mut self, attribute: &str, sub_key: Option<&str>) -> Option<Value> {
        remove_segment(&mut self.values, attribute, sub_key)
    }

    pub fn original(&self) -> &Map<String, Value> {
        &self.original
    }

    pub fn original_value(&self, key: &str) -> Option<&Value> {
        self.original.get(key)
    }

    pub fn original_segment(&self, attribute: &str, sub_key: Option<&str>) -> Option<&Value> {
        get_segment(&self.original, attribute, sub_key)
    }

    /// Takes a new snapshot of the current values.
    pub fn sync_original(&mut self) {
        self.original = self.values.clone();
    }

    /// True when `key` differs from the snapshot, including added or removed keys.
    pub fn is_dirty(&self, key: &str) -> bool {
        match (self.values.get(key), self.original.get(key)) {
            (Some(current), Some(original)) => !canonical_eq(current, original),
            (None, None) => false,
            _ => true,
        }
    }

    /// Every key that is dirty, sorted.
    pub fn dirty_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .keys()
            .chain(self.original.keys())
            .filter(|key| self.is_dirty(key))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}
