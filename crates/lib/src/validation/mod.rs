//! Schema validation capability.
//!
//! Document types that declare a schema are validated against it before their
//! state is written to their host. The check itself is delegated to a
//! [`Validator`]; the registry uses [`SchemaValidator`] unless another one is
//! supplied.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

mod schema;
pub use schema::SchemaValidator;

/// Messages keyed by the dotted path of the offending field.
///
/// The document itself is reported under the empty path `""`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Validates a serialized document against a schema.
pub trait Validator {
    /// Returns every problem found, or `Ok(())` when the document conforms.
    fn validate(&self, document: &Value, schema: &Value) -> Result<(), FieldErrors>;
}

/// A document failed its schema.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Validation failed for '{doc_type}': {}", summarize(.field_errors))]
pub struct ValidationError {
    pub doc_type: String,
    pub field_errors: FieldErrors,
}

fn summarize(field_errors: &FieldErrors) -> String {
    field_errors
        .iter()
        .map(|(path, messages)| {
            let path = if path.is_empty() { "<document>" } else { path };
            format!("{path}: {}", messages.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn new(doc_type: impl Into<String>, field_errors: FieldErrors) -> Self {
        Self {
            doc_type: doc_type.into(),
            field_errors,
        }
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    /// Messages for one field path.
    pub fn messages_for(&self, path: &str) -> &[String] {
        self.field_errors
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// True if `path` has at least one message.
    pub fn has_error_at(&self, path: &str) -> bool {
        !self.messages_for(path).is_empty()
    }
}

impl From<ValidationError> for crate::Error {
    fn from(err: ValidationError) -> Self {
        crate::Error::Validation(err)
    }
}
