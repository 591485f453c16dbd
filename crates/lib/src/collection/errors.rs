//! Error types for document collections.

use thiserror::Error;

/// Structured error types for collection operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The collection was used before an item type was set
    #[error("Collection has no item type")]
    MissingItemType,

    /// The operation needs a link and the collection is transient
    #[error("Collection of '{item_type}' is not linked")]
    NotLinked { item_type: String },

    /// Another member already holds this primary-key value
    #[error("Duplicate value '{value}' for primary key '{key}'")]
    DuplicatePrimaryKey { key: String, value: String },

    /// A keyed collection received an item without a primary-key value
    #[error("Item has no value for primary key '{key}'")]
    MissingPrimaryKey { key: String },

    /// The item is neither a document of the item type nor an object
    #[error("Expected a '{expected}' item, got {actual}")]
    WrongItemType { expected: String, actual: String },

    /// Collection data must be an array (or an object of items)
    #[error("Collection data must be an array, got {actual}")]
    NotASequence { actual: String },
}

impl CollectionError {
    /// Check if this error is a configuration fault
    pub fn is_config_error(&self) -> bool {
        matches!(self, CollectionError::MissingItemType)
    }

    /// Check if this error is a link-state fault
    pub fn is_link_error(&self) -> bool {
        matches!(self, CollectionError::NotLinked { .. })
    }

    /// Check if this error is type-related
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            CollectionError::WrongItemType { .. }
                | CollectionError::NotASequence { .. }
                | CollectionError::MissingPrimaryKey { .. }
        )
    }

    /// Check if this error is a primary-key collision
    pub fn is_uniqueness_error(&self) -> bool {
        matches!(self, CollectionError::DuplicatePrimaryKey { .. })
    }
}

impl From<CollectionError> for crate::Error {
    fn from(err: CollectionError) -> Self {
        crate::Error::Collection(err)
    }
}
