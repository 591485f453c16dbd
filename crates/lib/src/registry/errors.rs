//! Error types for document type declarations and the registry.

use thiserror::Error;

/// Configuration faults. These indicate programming or configuration errors
/// and are never retried.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A document type name is not registered
    #[error("Unknown document type '{name}'")]
    UnknownType { name: String },

    /// A link declaration points at a type that was never registered
    #[error("Document type '{doc_type}' links attribute '{attribute}' to unknown type '{child_type}'")]
    UnknownChildType {
        doc_type: String,
        attribute: String,
        child_type: String,
    },

    /// The same type name was registered twice
    #[error("Document type '{name}' is already registered")]
    DuplicateType { name: String },

    /// A linked-attribute declaration has the wrong shape
    #[error("Malformed linked attribute '{attribute}' on '{doc_type}': {reason}")]
    MalformedLink {
        doc_type: String,
        attribute: String,
        reason: String,
    },

    /// An operation named an attribute that is not a linked attribute
    #[error("'{attribute}' is not a linked attribute of '{doc_type}'")]
    UnknownAttribute { doc_type: String, attribute: String },

    /// A cast name in configuration is not recognised
    #[error("Unknown cast '{cast}' for attribute '{attribute}' on '{doc_type}'")]
    InvalidCast {
        doc_type: String,
        attribute: String,
        cast: String,
    },
}

impl RegistryError {
    /// Check if this error indicates a type was not found
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::UnknownType { .. }
                | RegistryError::UnknownChildType { .. }
                | RegistryError::UnknownAttribute { .. }
        )
    }

    /// Check if this error comes from a malformed declaration
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            RegistryError::MalformedLink { .. } | RegistryError::InvalidCast { .. }
        )
    }

    /// Get the document type named by this error
    pub fn doc_type(&self) -> &str {
        match self {
            RegistryError::UnknownType { name } | RegistryError::DuplicateType { name } => name,
            RegistryError::UnknownChildType { doc_type, .. }
            | RegistryError::MalformedLink { doc_type, .. }
            | RegistryError::UnknownAttribute { doc_type, .. }
            | RegistryError::InvalidCast { doc_type, .. } => doc_type,
        }
    }

    /// Get the attribute named by this error, if any
    pub fn attribute(&self) -> Option<&str> {
        match self {
            RegistryError::UnknownChildType { attribute, .. }
            | RegistryError::MalformedLink { attribute, .. }
            | RegistryError::UnknownAttribute { attribute, .. }
            | RegistryError::InvalidCast { attribute, .. } => Some(attribute),
            _ => None,
        }
    }
}

impl From<RegistryError> for crate::Error {
    fn from(err: RegistryError) -> Self {
        crate::Error::Registry(err)
    }
}
