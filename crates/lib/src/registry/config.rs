//! Declarative registry configuration.
//!
//! Document types can be declared in JSON instead of code:
//!
//! ```json
//! {
//!   "types": {
//!     "Garage": {
//!       "linked": { "cars": ["Car", "cars", null, true, "vin"] },
//!       "casts": { "opened": "datetime" },
//!       "nullable_when_empty": false,
//!       "schema": { "type": "object", "required": ["name"] }
//!     },
//!     "Car": {}
//!   }
//! }
//! ```
//!
//! Hooks and custom casts have no JSON form; attach them with
//! [`RegistryBuilder::on`](super::RegistryBuilder::on) after loading.

use std::{collections::BTreeMap, fs, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DocumentType, RegistryError};
use crate::{Result, attributes::Cast};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub types: IndexMap<String, TypeConfig>,
}

/// Declaration of one document type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeConfig {
    /// Linked attributes in their positional tuple form, in cascade order.
    pub linked: IndexMap<String, Value>,
    /// Attribute name to cast name (`int`, `float`, `string`, `bool`, `datetime`).
    pub casts: BTreeMap<String, String>,
    pub nullable_when_empty: bool,
    pub schema: Option<Value>,
}

impl RegistryConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

impl TypeConfig {
    /// Builds the declared type, checking every tuple and cast name.
    pub fn to_document_type(&self, name: &str) -> std::result::Result<DocumentType, RegistryError> {
        let mut doc_type = DocumentType::new(name).nullable_when_empty(self.nullable_when_empty);

        for (attribute, raw) in &self.linked {
            doc_type = doc_type.link_tuple(attribute, raw)?;
        }

        for (attribute, cast_name) in &self.casts {
            let cast = Cast::from_name(cast_name).ok_or_else(|| RegistryError::InvalidCast {
                doc_type: name.to_string(),
                attribute: attribute.clone(),
                cast: cast_name.clone(),
            })?;
            doc_type = doc_type.cast(attribute.clone(), cast);
        }

        if let Some(schema) = &self.schema {
            doc_type = doc_type.schema(schema.clone());
        }

        Ok(doc_type)
    }
}
