//!
//! docmap: ORM-style documents persisted inside JSON data.
//!
//! A document behaves like a model instance (typed attributes, casts, dirty
//! tracking, lifecycle hooks, schema validation) but its storage is a slice of
//! a parent's JSON rather than a database row.
//!
//! ## Core Concepts
//!
//! * **Registry (`registry::Registry`)**: The explicit, immutable set of document types known to a process.
//!   Each `registry::DocumentType` declares its linked attributes, casts, schema and hooks.
//! * **Documents (`document::Document`)**: Hydrated, typed objects. A document is either transient
//!   (built from a literal) or linked to a location inside a host.
//! * **Links (`link::Link`)**: The `(host, attribute, sub_key)` triple naming where a document's data lives.
//!   Hosts are root collaborators, other documents, or collections, so links nest to any depth.
//! * **Collections (`collection::DocumentCollection`)**: Ordered or primary-key-indexed groups of documents
//!   sharing one link target, stored as a JSON array.
//! * **Roots (`root::Root`)**: The outermost collaborator whose `save()` durably commits data.
//!
//! Reads fetch from the link target, writes stage locally, and `save()` cascades hooks down the
//! cached subtree before writing back up through each link until the root commits.

pub mod attributes;
pub mod canonical;
pub mod collection;
pub mod document;
pub mod hooks;
pub mod link;
pub mod registry;
pub mod root;
pub mod validation;

pub use collection::{DocumentCollection, WeakCollection};
pub use document::{Attribute, Document, WeakDocument};
pub use hooks::{HookOutcome, LifecycleEvent};
pub use link::{Cascade, Host, Link, Linkable};
pub use registry::{DocumentType, LinkedAttribute, Registry};
pub use root::{JsonFileRoot, MemoryRoot, Root};

/// Result type used throughout the docmap library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the docmap library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured errors from the canonical JSON helpers
    #[error(transparent)]
    Canonical(canonical::CanonicalError),

    /// Structured errors from attribute casting
    #[error(transparent)]
    Attribute(attributes::AttributeError),

    /// Structured errors from type declarations and the registry
    #[error(transparent)]
    Registry(registry::RegistryError),

    /// Structured errors from the document module
    #[error(transparent)]
    Document(document::DocumentError),

    /// Structured errors from the collection module
    #[error(transparent)]
    Collection(collection::CollectionError),

    /// Schema validation rejected a document
    #[error(transparent)]
    Validation(validation::ValidationError),

    /// Structured errors from root collaborators
    #[error(transparent)]
    Root(root::RootError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
            Error::Canonical(_) => "canonical",
            Error::Attribute(_) => "attributes",
            Error::Registry(_) => "registry",
            Error::Document(_) => "document",
            Error::Collection(_) => "collection",
            Error::Validation(_) => "validation",
            Error::Root(_) => "root",
        }
    }

    /// Check if this error is a configuration fault (bad declarations, missing types).
    pub fn is_config_error(&self) -> bool {
        match self {
            Error::Registry(_) => true,
            Error::Collection(collection_err) => collection_err.is_config_error(),
            _ => false,
        }
    }

    /// Check if this error indicates an operation needed a live link.
    pub fn is_link_error(&self) -> bool {
        match self {
            Error::Document(document_err) => document_err.is_link_error(),
            Error::Collection(collection_err) => collection_err.is_link_error(),
            _ => false,
        }
    }

    /// Check if this error is type-related.
    pub fn is_type_error(&self) -> bool {
        match self {
            Error::Attribute(attribute_err) => attribute_err.is_cast_error(),
            Error::Document(document_err) => document_err.is_type_error(),
            Error::Collection(collection_err) => collection_err.is_type_error(),
            _ => false,
        }
    }

    /// Check if this error is a primary-key collision.
    pub fn is_uniqueness_error(&self) -> bool {
        match self {
            Error::Collection(collection_err) => collection_err.is_uniqueness_error(),
            _ => false,
        }
    }

    /// Check if this error is an assignment vetoed by a lifecycle hook.
    pub fn is_veto(&self) -> bool {
        match self {
            Error::Document(document_err) => document_err.is_veto(),
            _ => false,
        }
    }

    /// Check if this error is a schema validation failure.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// Per-field messages when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&validation::FieldErrors> {
        match self {
            Error::Validation(validation_err) => Some(validation_err.field_errors()),
            _ => None,
        }
    }
}
