//! Document type registry.
//!
//! A [`Registry`] holds every [`DocumentType`] known to a process together
//! with the [`Validator`] used for schema checks. It is built once through
//! [`RegistryBuilder`], is immutable afterwards, and is passed explicitly to
//! the document constructors. Dropping the last handle tears it down.
//!
//! Linked attributes reference their child types by name; [`RegistryBuilder::build`]
//! rejects names that were never registered, so resolution at runtime is a
//! plain map lookup.

use std::{collections::HashMap, fmt, rc::Rc};

use handle_trait::Handle;
use indexmap::IndexMap;

use crate::{
    Document, Result,
    hooks::{HookOutcome, LifecycleEvent},
    validation::{SchemaValidator, Validator},
};

mod config;
mod errors;
mod types;

pub use config::{RegistryConfig, TypeConfig};
pub use errors::RegistryError;
pub use types::{DocumentType, LinkedAttribute};

/// Name of the built-in type with no links, casts, schema or hooks.
pub const DEFAULT_TYPE: &str = "document";

struct RegistryInternal {
    types: HashMap<String, Rc<DocumentType>>,
    validator: Rc<dyn Validator>,
}

/// Cheap-to-clone handle to an immutable set of document types.
#[derive(Clone, Handle)]
pub struct Registry {
    inner: Rc<RegistryInternal>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.inner.types.keys().collect();
        names.sort();
        f.debug_struct("Registry").field("types", &names).finish()
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Builds a registry from a configuration document.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Self::builder().config(config)?.build()
    }

    /// Looks up a registered type.
    pub fn document_type(&self, name: &str) -> std::result::Result<Rc<DocumentType>, RegistryError> {
        self.inner
            .types
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownType {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.types.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn validator(&self) -> &dyn Validator {
        self.inner.validator.as_ref()
    }

    pub fn ptr_eq(&self, other: &Registry) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Collects type declarations and produces a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    types: IndexMap<String, DocumentType>,
    validator: Option<Rc<dyn Validator>>,
}

impl RegistryBuilder {
    /// Adds a type. Names must be unique.
    pub fn register(mut self, doc_type: DocumentType) -> Result<Self> {
        let name = doc_type.name().to_string();
        if self.types.contains_key(&name) {
            return Err(RegistryError::DuplicateType { name }.into());
        }
        self.types.insert(name, doc_type);
        Ok(self)
    }

    /// Adds every type declared in `config`.
    pub fn config(mut self, config: &RegistryConfig) -> Result<Self> {
        for (name, type_config) in &config.types {
            self = self.register(type_config.to_document_type(name)?)?;
        }
        Ok(self)
    }

    /// Attaches a hook to an already-added type.
    pub fn on<F, R>(mut self, type_name: &str, event: LifecycleEvent, hook: F) -> Result<Self>
    where
        F: Fn(&Document) -> R + 'static,
        R: Into<HookOutcome>,
    {
        let doc_type =
            self.types
                .get_mut(type_name)
                .ok_or_else(|| RegistryError::UnknownType {
                    name: type_name.to_string(),
                })?;
        doc_type.listen(event, hook);
        Ok(self)
    }

    /// Replaces the default [`SchemaValidator`].
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Rc::new(validator));
        self
    }

    /// Checks every link target and freezes the registry.
    pub fn build(mut self) -> Result<Registry> {
        if !self.types.contains_key(DEFAULT_TYPE) {
            self.types
                .insert(DEFAULT_TYPE.to_string(), DocumentType::new(DEFAULT_TYPE));
        }

        for doc_type in self.types.values() {
            for (attribute, config) in doc_type.linked_attributes() {
                if !self.types.contains_key(&config.child_type) {
                    return Err(RegistryError::UnknownChildType {
                        doc_type: doc_type.name().to_string(),
                        attribute: attribute.to_string(),
                        child_type: config.child_type.clone(),
                    }
                    .into());
                }
            }
        }

        let types = self
            .types
            .into_iter()
            .map(|(name, doc_type)| (name, Rc::new(doc_type)))
            .collect();

        tracing::debug!("document registry built");
        Ok(Registry {
            inner: Rc::new(RegistryInternal {
                types,
                validator: self
                    .validator
                    .unwrap_or_else(|| Rc::new(SchemaValidator::new())),
            }),
        })
    }
}
