//! Error types for document operations.

use thiserror::Error;

/// Structured error types for document operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The operation needs a link and the document is transient
    #[error("Document of type '{doc_type}' is not linked")]
    NotLinked { doc_type: String },

    /// The host document or collection this link pointed into no longer exists
    #[error("The host of this link has been dropped")]
    HostDropped,

    /// A value of the wrong shape was assigned to a declared attribute
    #[error("Attribute '{attribute}' of '{doc_type}' expects {expected}, got {actual}")]
    TypeMismatch {
        doc_type: String,
        attribute: String,
        expected: String,
        actual: String,
    },

    /// A document was assigned as one of its own attributes
    #[error("Cannot assign a '{doc_type}' document to its own attribute '{attribute}'")]
    SelfReference { doc_type: String, attribute: String },

    /// Document data must be a JSON object
    #[error("Data for a '{doc_type}' document must be an object, got {actual}")]
    InvalidData { doc_type: String, actual: String },

    /// A pre-save hook of the assigned document vetoed the assignment
    #[error("Assigning '{attribute}' of '{doc_type}' was vetoed by a hook")]
    AssignmentVetoed { doc_type: String, attribute: String },
}

impl DocumentError {
    /// Check if this error is a link-state fault
    pub fn is_link_error(&self) -> bool {
        matches!(
            self,
            DocumentError::NotLinked { .. } | DocumentError::HostDropped
        )
    }

    /// Check if this error is type-related
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            DocumentError::TypeMismatch { .. }
                | DocumentError::SelfReference { .. }
                | DocumentError::InvalidData { .. }
        )
    }

    /// Check if this error is a hook veto
    pub fn is_veto(&self) -> bool {
        matches!(self, DocumentError::AssignmentVetoed { .. })
    }

    /// Get the document type associated with this error, if any
    pub fn doc_type(&self) -> Option<&str> {
        match self {
            DocumentError::NotLinked { doc_type }
            | DocumentError::TypeMismatch { doc_type, .. }
            | DocumentError::SelfReference { doc_type, .. }
            | DocumentError::InvalidData { doc_type, .. }
            | DocumentError::AssignmentVetoed { doc_type, .. } => Some(doc_type),
            DocumentError::HostDropped => None,
        }
    }
}

impl From<DocumentError> for crate::Error {
    fn from(err: DocumentError) -> Self {
        crate::Error::Document(err)
    }
}
