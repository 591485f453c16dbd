//! Documents: typed attribute bags persisted inside their host's JSON.
//!
//! A [`Document`] is a cheap-to-clone handle; clones share one underlying
//! state. Documents are created in one of two ways:
//!
//! * [`Document::new`] builds a *transient* document from a literal. It can be
//!   read, mutated and serialized, but not saved.
//! * [`Document::linked`] / [`Document::linked_at`] build a document linked to
//!   `host[attribute]` (or `host[attribute][sub_key]`) and immediately load the
//!   data stored there.
//!
//! Linked attributes declared on the document's [`DocumentType`] hydrate into
//! child documents or collections as soon as the document is built, and are
//! cached, so repeated reads return the same instance and edits accumulate
//! until `save()`.
//!
//! Saving cascades downward and writes upward: hooks fire on this document,
//! then on every cached child in declaration order; then each child folds its
//! state into its parent, the parent writes itself into its host, and the host
//! chain is persisted until the root collaborator commits.

use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

use chrono::{DateTime, Utc};
use handle_trait::Handle;
use indexmap::IndexMap;
use serde::{Serialize, Serializer, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::{
    DocumentCollection, Result,
    attributes::{AttributeError, Attributes, Cast, get_segment, remove_segment, set_segment},
    canonical::{canonical_eq, value_kind},
    hooks::{HookOutcome, LifecycleEvent},
    link::{Cascade, Host, Link, Linkable},
    registry::{DocumentType, LinkedAttribute, Registry, RegistryError},
    root::Root,
    validation::ValidationError,
};

mod errors;

pub use errors::DocumentError;

/// True for `null`, `{}` and `[]`.
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// The result of reading an attribute, or a value to assign to one.
#[derive(Debug, Clone)]
pub enum Attribute {
    Value(Value),
    Document(Document),
    Collection(DocumentCollection),
}

impl Attribute {
    pub fn is_null(&self) -> bool {
        matches!(self, Attribute::Value(Value::Null))
    }

    /// `null`, an empty document or an empty collection.
    pub fn is_empty(&self) -> bool {
        match self {
            Attribute::Value(value) => value.is_null(),
            Attribute::Document(doc) => doc.is_empty(),
            Attribute::Collection(collection) => collection.is_empty(),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Attribute::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Attribute::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<Document> {
        match self {
            Attribute::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&DocumentCollection> {
        match self {
            Attribute::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    pub fn into_collection(self) -> Option<DocumentCollection> {
        match self {
            Attribute::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    /// Serialized form. Documents and collections serialize themselves.
    pub fn to_value(&self) -> Value {
        match self {
            Attribute::Value(value) => value.clone(),
            Attribute::Document(doc) => doc.to_value(),
            Attribute::Collection(collection) => collection.to_value(),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Attribute::Value(value) => value_kind(value).to_string(),
            Attribute::Document(doc) => format!("a '{}' document", doc.type_name()),
            Attribute::Collection(_) => "a collection".to_string(),
        }
    }
}

impl From<Value> for Attribute {
    fn from(value: Value) -> Self {
        Attribute::Value(value)
    }
}

impl From<Document> for Attribute {
    fn from(doc: Document) -> Self {
        Attribute::Document(doc)
    }
}

impl From<DocumentCollection> for Attribute {
    fn from(collection: DocumentCollection) -> Self {
        Attribute::Collection(collection)
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Attribute::Value(Value::from(value))
    }
}

impl From<String> for Attribute {
    fn from(value: String) -> Self {
        Attribute::Value(Value::from(value))
    }
}

impl From<i32> for Attribute {
    fn from(value: i32) -> Self {
        Attribute::Value(Value::from(value))
    }
}

impl From<i64> for Attribute {
    fn from(value: i64) -> Self {
        Attribute::Value(Value::from(value))
    }
}

impl From<u64> for Attribute {
    fn from(value: u64) -> Self {
        Attribute::Value(Value::from(value))
    }
}

impl From<f64> for Attribute {
    fn from(value: f64) -> Self {
        Attribute::Value(Value::from(value))
    }
}

impl From<bool> for Attribute {
    fn from(value: bool) -> Self {
        Attribute::Value(Value::from(value))
    }
}

/// A hydrated linked attribute held in a document's cache.
#[derive(Debug, Clone)]
pub(crate) enum Child {
    Document(Document),
    Collection(DocumentCollection),
}

impl Child {
    fn as_cascade(&self) -> &dyn Cascade {
        match self {
            Child::Document(doc) => doc,
            Child::Collection(collection) => collection,
        }
    }

    fn as_linkable(&self) -> &dyn Linkable {
        match self {
            Child::Document(doc) => doc,
            Child::Collection(collection) => collection,
        }
    }

    /// A new document child with no data. It writes nothing upstream.
    fn is_vacant(&self) -> bool {
        match self {
            Child::Document(doc) => !doc.exists() && doc.is_empty(),
            Child::Collection(_) => false,
        }
    }
}

impl From<Child> for Attribute {
    fn from(child: Child) -> Self {
        match child {
            Child::Document(doc) => Attribute::Document(doc),
            Child::Collection(collection) => Attribute::Collection(collection),
        }
    }
}

struct DocumentInternal {
    registry: Registry,
    doc_type: Rc<DocumentType>,
    attributes: Attributes,
    link: Option<Link>,
    /// Confirmed present upstream; drives creating/created.
    exists: bool,
    /// `creating` already fired when this document was assigned to a parent.
    creating_announced: bool,
    /// Hydrated linked attributes by attribute name.
    cache: IndexMap<String, Child>,
}

/// A typed document. Cheap to clone; clones share state.
#[derive(Clone, Handle)]
pub struct Document {
    inner: Rc<RefCell<DocumentInternal>>,
}

/// Non-owning reference to a [`Document`], held by linked children.
#[derive(Clone, Handle)]
pub struct WeakDocument {
    inner: Weak<RefCell<DocumentInternal>>,
}

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        self.inner.upgrade().map(|inner| Document { inner })
    }
}

impl fmt::Debug for WeakDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakDocument")
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Document")
                .field("type", &inner.doc_type.name())
                .field("attributes", inner.attributes.as_map())
                .field("link", &inner.link.as_ref().map(Link::path))
                .field("exists", &inner.exists)
                .field("cached", &inner.cache.keys().collect::<Vec<_>>())
                .finish(),
            Err(_) => f.write_str("Document { <borrowed> }"),
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn object_data(doc_type: &DocumentType, data: Value) -> Result<Map<String, Value>> {
    match data {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(DocumentError::InvalidData {
            doc_type: doc_type.name().to_string(),
            actual: value_kind(&other).to_string(),
        }
        .into()),
    }
}

impl Document {
    fn empty(registry: &Registry, doc_type: Rc<DocumentType>) -> Self {
        let attributes = Attributes::new(doc_type.casts().clone());
        Self {
            inner: Rc::new(RefCell::new(DocumentInternal {
                registry: registry.handle(),
                doc_type,
                attributes,
                link: None,
                exists: false,
                creating_announced: false,
                cache: IndexMap::new(),
            })),
        }
    }

    /// Builds a transient document from a JSON object (or `null`).
    pub fn new(registry: &Registry, type_name: &str, data: Value) -> Result<Self> {
        let doc_type = registry.document_type(type_name)?;
        let values = object_data(&doc_type, data)?;
        let doc = Self::empty(registry, doc_type);
        doc.inner.borrow_mut().attributes.fill_raw(values);
        doc.hydrate_all()?;
        Ok(doc)
    }

    /// Builds a document linked to `host[attribute]` and loads its data.
    pub fn linked(
        registry: &Registry,
        type_name: &str,
        host: impl Into<Host>,
        attribute: &str,
    ) -> Result<Self> {
        let doc_type = registry.document_type(type_name)?;
        Self::open(registry, doc_type, Link::new(host, attribute, None))
    }

    /// Builds a document linked to `host[attribute][sub_key]` and loads its data.
    pub fn linked_at(
        registry: &Registry,
        type_name: &str,
        host: impl Into<Host>,
        attribute: &str,
        sub_key: &str,
    ) -> Result<Self> {
        let doc_type = registry.document_type(type_name)?;
        Self::open(
            registry,
            doc_type,
            Link::new(host, attribute, Some(sub_key.to_string())),
        )
    }

    fn open(registry: &Registry, doc_type: Rc<DocumentType>, link: Link) -> Result<Self> {
        let doc = Self::empty(registry, doc_type);
        doc.inner.borrow_mut().link = Some(link);
        doc.fresh()?;
        Ok(doc)
    }

    /// Reloads local state from the link target and drops every cached child.
    ///
    /// `exists` becomes true when the link target holds a non-null value.
    pub fn fresh(&self) -> Result<()> {
        let data = self.get_linked_data()?;
        let exists = !data.is_null();
        let values = object_data(&self.doc_type(), data)?;
        let stale = {
            let mut inner = self.inner.borrow_mut();
            inner.attributes.load(values);
            inner.exists = exists;
            std::mem::take(&mut inner.cache)
        };
        drop(stale);
        self.hydrate_all()
    }

    /// Hydrates every declared linked attribute.
    ///
    /// A link with nothing stored whose child type is this document's own
    /// type, or the type of one of its ancestors, is left for first access.
    /// Otherwise recursive types would hydrate forever.
    fn hydrate_all(&self) -> Result<()> {
        let doc_type = self.doc_type();
        for (name, config) in doc_type.linked_attributes() {
            let stored = self.read_segment(&config.host_attribute, config.host_sub_key.as_deref());
            if stored.is_null() && self.closes_type_cycle(&config.child_type) {
                trace!(doc_type = doc_type.name(), attribute = %name, "deferring recursive link");
                continue;
            }
            self.get(name)?;
        }
        Ok(())
    }

    fn closes_type_cycle(&self, child_type: &str) -> bool {
        self.inner.borrow().doc_type.name() == child_type
            || self.get_ancestor_of_type(child_type).is_some()
    }

    pub fn registry(&self) -> Registry {
        self.inner.borrow().registry.handle()
    }

    pub fn doc_type(&self) -> Rc<DocumentType> {
        self.inner.borrow().doc_type.clone()
    }

    pub fn type_name(&self) -> String {
        self.inner.borrow().doc_type.name().to_string()
    }

    pub fn exists(&self) -> bool {
        self.inner.borrow().exists
    }

    pub(crate) fn mark_exists(&self, exists: bool) {
        self.inner.borrow_mut().exists = exists;
    }

    /// Treats the current state as freshly loaded from storage.
    pub(crate) fn mark_loaded(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.exists = true;
        inner.attributes.sync_original();
    }

    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn cached(&self, name: &str) -> Option<Child> {
        self.inner.borrow().cache.get(name).cloned()
    }

    fn cache_child(&self, name: &str, child: Child) {
        let replaced = self.inner.borrow_mut().cache.insert(name.to_string(), child);
        drop(replaced);
    }

    /// Cached children in declaration order.
    fn cached_children(&self) -> Vec<Child> {
        let doc_type = self.doc_type();
        let inner = self.inner.borrow();
        doc_type
            .linked_attributes()
            .filter_map(|(name, _)| inner.cache.get(name).cloned())
            .collect()
    }

    fn mismatch(&self, attribute: &str, expected: impl Into<String>, actual: &Attribute) -> crate::Error {
        DocumentError::TypeMismatch {
            doc_type: self.type_name(),
            attribute: attribute.to_string(),
            expected: expected.into(),
            actual: actual.describe(),
        }
        .into()
    }

    fn unknown_linked(&self, attribute: &str) -> crate::Error {
        RegistryError::UnknownAttribute {
            doc_type: self.type_name(),
            attribute: attribute.to_string(),
        }
        .into()
    }

    /// Reads an attribute.
    ///
    /// Linked attributes return the cached child, hydrating and caching it on
    /// first access. A document child whose type is nullable-when-empty reads
    /// as `null` while it has no data, and is not cached. Plain attributes
    /// return their cast value, or `null` when absent.
    pub fn get(&self, name: &str) -> Result<Attribute> {
        if let Some(child) = self.cached(name) {
            return Ok(child.into());
        }

        let doc_type = self.doc_type();
        let Some(config) = doc_type.linked_attribute(name) else {
            let inner = self.inner.borrow();
            return Ok(Attribute::Value(
                inner.attributes.get_cast(name).unwrap_or(Value::Null),
            ));
        };

        trace!(
            doc_type = doc_type.name(),
            attribute = name,
            child_type = %config.child_type,
            collection = config.is_collection,
            "hydrating linked attribute"
        );
        let registry = self.registry();
        let sub_key = config.host_sub_key.clone();

        if config.is_collection {
            let collection = DocumentCollection::of_type(&registry, &config.child_type)?;
            collection.set_primary_key(config.primary_key.as_deref())?;
            collection.link(Host::from(self), &config.host_attribute, sub_key.as_deref());
            collection.fresh()?;
            self.cache_child(name, Child::Collection(collection.clone()));
            return Ok(Attribute::Collection(collection));
        }

        let child_type = registry.document_type(&config.child_type)?;
        let nullable = child_type.is_nullable_when_empty();
        let child = Document::open(
            &registry,
            child_type,
            Link::new(self, config.host_attribute.clone(), sub_key),
        )?;
        if nullable && child.is_empty() {
            return Ok(Attribute::Value(Value::Null));
        }
        self.cache_child(name, Child::Document(child.clone()));
        Ok(Attribute::Document(child))
    }

    /// Reads a document-valued linked attribute. `None` when it reads as `null`.
    pub fn document(&self, name: &str) -> Result<Option<Document>> {
        Ok(self.get(name)?.into_document())
    }

    /// Reads a collection-valued linked attribute.
    pub fn collection(&self, name: &str) -> Result<Option<DocumentCollection>> {
        Ok(self.get(name)?.into_collection())
    }

    /// Plain attribute value, `null` when absent or linked.
    pub fn value(&self, name: &str) -> Result<Value> {
        Ok(self.get(name)?.to_value())
    }

    /// Deserializes an attribute's serialized form.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        Ok(serde_json::from_value(self.value(name)?)?)
    }

    /// Reads an attribute as a UTC timestamp. `None` when absent.
    pub fn get_datetime(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        let value = self.value(name)?;
        if value.is_null() {
            return Ok(None);
        }
        let failed = |reason: String| AttributeError::CastFailed {
            key: name.to_string(),
            cast: "datetime".to_string(),
            reason,
        };
        let normalized = Cast::DateTime.apply(&value).map_err(failed)?;
        let text = normalized.as_str().unwrap_or_default();
        let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| failed(e.to_string()))?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }

    /// Assigns an attribute.
    ///
    /// * Plain attributes take a JSON value and apply the declared cast.
    /// * Document attributes take a document of the child type, an object
    ///   (coerced through [`Document::new`]) or `null` (unset). The child is
    ///   linked here, its pre-save hooks run, and its state is written into
    ///   this document. A veto fails with [`DocumentError::AssignmentVetoed`].
    ///   `creating` does not fire again on the next save.
    /// * Collection attributes take an array or a collection; every item goes
    ///   through the collection's push path. The cached collection is replaced.
    ///
    /// On error nothing is changed.
    pub fn set(&self, name: &str, value: impl Into<Attribute>) -> Result<()> {
        let value = value.into();
        let doc_type = self.doc_type();
        match doc_type.linked_attribute(name) {
            None => match value {
                Attribute::Value(value) => {
                    self.inner.borrow_mut().attributes.set(name, value)?;
                    Ok(())
                }
                other => Err(self.mismatch(name, "a JSON value", &other)),
            },
            Some(config) if config.is_collection => self.set_collection(name, config, value),
            Some(config) => self.set_document(name, config, value),
        }
    }

    fn set_document(&self, name: &str, config: &LinkedAttribute, value: Attribute) -> Result<()> {
        let expected = format!("a '{}' document", config.child_type);
        let child = match value {
            Attribute::Document(doc) => {
                if doc.ptr_eq(self) {
                    return Err(DocumentError::SelfReference {
                        doc_type: self.type_name(),
                        attribute: name.to_string(),
                    }
                    .into());
                }
                if doc.type_name() != config.child_type {
                    return Err(self.mismatch(name, expected, &Attribute::Document(doc)));
                }
                doc
            }
            Attribute::Value(Value::Null) => {
                self.unset(name);
                return Ok(());
            }
            Attribute::Value(data @ Value::Object(_)) => {
                Document::new(&self.registry(), &config.child_type, data)?
            }
            other => return Err(self.mismatch(name, expected, &other)),
        };

        let previous = child.linked_to();
        child.link(
            Host::from(self),
            &config.host_attribute,
            config.host_sub_key.as_deref(),
        );
        let assigned = child.pre_save().and_then(|passed| {
            if !passed {
                return Err(DocumentError::AssignmentVetoed {
                    doc_type: self.type_name(),
                    attribute: name.to_string(),
                }
                .into());
            }
            child.set_linked_data()
        });
        if let Err(err) = assigned {
            child.inner.borrow_mut().link = previous;
            return Err(err);
        }
        child.announce_creating();
        self.cache_child(name, Child::Document(child));
        Ok(())
    }

    /// Records that `creating` fired for this subtree, so the next save
    /// skips it on documents that are still new.
    fn announce_creating(&self) {
        if !self.exists() {
            self.inner.borrow_mut().creating_announced = true;
        }
        for child in self.cached_children() {
            match child {
                Child::Document(doc) => doc.announce_creating(),
                Child::Collection(collection) => {
                    collection.iter().for_each(|doc| doc.announce_creating());
                }
            }
        }
    }

    fn set_collection(&self, name: &str, config: &LinkedAttribute, value: Attribute) -> Result<()> {
        let collection = DocumentCollection::of_type(&self.registry(), &config.child_type)?;
        collection.set_primary_key(config.primary_key.as_deref())?;

        // Members of a source collection are relinked by the push, so their
        // links are put back if the assignment fails.
        let mut previous_links = Vec::new();
        let filled = match value {
            Attribute::Collection(source) => {
                let members = source.documents();
                previous_links = members.iter().map(|doc| (doc.clone(), doc.linked_to())).collect();
                collection.push_all(members)
            }
            Attribute::Value(Value::Array(items)) => collection.push_all(items),
            other => {
                return Err(self.mismatch(name, "an array or collection", &other));
            }
        };

        let assigned = filled.and_then(|()| {
            collection.link(
                Host::from(self),
                &config.host_attribute,
                config.host_sub_key.as_deref(),
            );
            collection.set_linked_data()
        });
        if let Err(err) = assigned {
            for (doc, link) in previous_links {
                doc.inner.borrow_mut().link = link;
            }
            return Err(err);
        }
        self.cache_child(name, Child::Collection(collection));
        Ok(())
    }

    /// Assigns every entry of `values` without saving.
    pub fn fill(&self, values: Map<String, Value>) -> Result<()> {
        for (key, value) in values {
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// Removes an attribute. For linked attributes the cached child is dropped
    /// and only the stored segment (the sub key, when declared) is cleared.
    pub fn unset(&self, name: &str) {
        let doc_type = self.doc_type();
        let removed = {
            let mut inner = self.inner.borrow_mut();
            match doc_type.linked_attribute(name) {
                Some(config) => {
                    inner.attributes.remove_segment(
                        &config.host_attribute,
                        config.host_sub_key.as_deref(),
                    );
                    inner.cache.shift_remove(name)
                }
                None => {
                    inner.attributes.remove(name);
                    None
                }
            }
        };
        drop(removed);
    }

    /// True when the attribute resolves to something non-null and non-empty.
    pub fn has(&self, name: &str) -> Result<bool> {
        Ok(!self.get(name)?.is_empty())
    }

    /// Serialized form: stored attributes overlaid with every cached child's
    /// own serialization. Empty children are omitted.
    pub fn to_value(&self) -> Value {
        let (mut map, doc_type, cache) = {
            let inner = self.inner.borrow();
            (
                inner.attributes.to_map(),
                inner.doc_type.clone(),
                inner.cache.clone(),
            )
        };

        for (name, config) in doc_type.linked_attributes() {
            let attribute = config.host_attribute.as_str();
            let sub_key = config.host_sub_key.as_deref();
            let value = match cache.get(name) {
                Some(child) => child.as_cascade().to_value(),
                None => match get_segment(&map, attribute, sub_key) {
                    Some(value) => value.clone(),
                    None => continue,
                },
            };

            if is_blank(&value) {
                remove_segment(&mut map, attribute, sub_key);
                if sub_key.is_some() && map.get(attribute).is_some_and(is_blank) {
                    map.remove(attribute);
                }
            } else {
                set_segment(&mut map, attribute, sub_key, value);
            }
        }

        Value::Object(map)
    }

    /// Compact JSON text of [`Document::to_value`]. An empty document is `{}`.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// True when the document serializes to `{}`.
    pub fn is_empty(&self) -> bool {
        self.to_value().as_object().is_some_and(Map::is_empty)
    }

    /// Current link, if any.
    pub fn linked_to(&self) -> Option<Link> {
        self.inner.borrow().link.clone()
    }

    pub fn link(&self, host: Host, attribute: &str, sub_key: Option<&str>) {
        self.inner.borrow_mut().link = Some(Link::new(host, attribute, sub_key.map(str::to_string)));
    }

    pub fn unlink(&self) {
        self.inner.borrow_mut().link = None;
    }

    pub fn is_linked(&self) -> bool {
        self.inner.borrow().link.is_some()
    }

    fn require_link(&self) -> Result<Link> {
        self.linked_to().ok_or_else(|| {
            DocumentError::NotLinked {
                doc_type: self.type_name(),
            }
            .into()
        })
    }

    /// Current value at the link target. Local state is untouched.
    pub fn get_linked_data(&self) -> Result<Value> {
        self.require_link()?.read()
    }

    /// Folds every cached child into local state, validates, and writes the
    /// serialized document into its host.
    pub fn set_linked_data(&self) -> Result<()> {
        let link = self.require_link()?;
        for child in self.cached_children() {
            if child.is_vacant() {
                continue;
            }
            child.as_linkable().set_linked_data()?;
        }
        self.validate_self()?;
        link.write(self.to_value())
    }

    /// `set_linked_data`, then persists the host chain up to the root.
    pub fn persist(&self) -> Result<bool> {
        let link = self.require_link()?;
        self.set_linked_data()?;
        link.persist()
    }

    pub(crate) fn read_segment(&self, attribute: &str, sub_key: Option<&str>) -> Value {
        self.inner
            .borrow()
            .attributes
            .segment(attribute, sub_key)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Writes a child's data into local state. `null` removes the segment and
    /// evicts any cached child stored there.
    pub(crate) fn write_segment(&self, attribute: &str, sub_key: Option<&str>, value: Value) {
        if !value.is_null() {
            self.inner
                .borrow_mut()
                .attributes
                .set_segment(attribute, sub_key, value);
            return;
        }

        let doc_type = self.doc_type();
        let evicted: Vec<Child> = {
            let mut inner = self.inner.borrow_mut();
            inner.attributes.remove_segment(attribute, sub_key);
            doc_type
                .linked_attributes()
                .filter(|(_, config)| {
                    config.host_attribute == attribute && config.host_sub_key.as_deref() == sub_key
                })
                .filter_map(|(name, _)| inner.cache.shift_remove(name))
                .collect()
        };
        drop(evicted);
    }

    fn fire(&self, event: LifecycleEvent) -> HookOutcome {
        let doc_type = self.doc_type();
        let outcome = doc_type.dispatcher().fire(event, self);
        if outcome.is_veto() {
            debug!(doc_type = doc_type.name(), %event, "hook vetoed");
        }
        outcome
    }

    fn validate_self(&self) -> Result<()> {
        let (doc_type, registry) = {
            let inner = self.inner.borrow();
            (inner.doc_type.clone(), inner.registry.handle())
        };
        let Some(schema) = doc_type.schema_value() else {
            return Ok(());
        };
        registry
            .validator()
            .validate(&self.to_value(), schema)
            .map_err(|field_errors| ValidationError::new(doc_type.name(), field_errors).into())
    }

    /// Validates every cached child, then this document against its schema.
    /// Vacant children are skipped; they serialize to nothing.
    pub fn validate_or_throw(&self) -> Result<()> {
        for child in self.cached_children() {
            if child.is_vacant() {
                continue;
            }
            child.as_cascade().validate_or_throw()?;
        }
        self.validate_self()
    }

    /// Fires `creating` (when new) and `saving` here, then cascades into
    /// cached children in declaration order. Stops at the first veto.
    pub fn pre_save(&self) -> Result<bool> {
        let announced = std::mem::take(&mut self.inner.borrow_mut().creating_announced);
        if !self.exists() && !announced && self.fire(LifecycleEvent::Creating).is_veto() {
            return Ok(false);
        }
        if self.fire(LifecycleEvent::Saving).is_veto() {
            return Ok(false);
        }
        for child in self.cached_children() {
            if !child.as_cascade().pre_save()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fires `saved` (and `created` on first save), cascades, and snapshots
    /// the saved state.
    pub fn post_save(&self) {
        self.fire(LifecycleEvent::Saved);
        if !self.exists() {
            self.mark_exists(true);
            self.fire(LifecycleEvent::Created);
        }
        for child in self.cached_children() {
            child.as_cascade().post_save();
        }
        self.inner.borrow_mut().attributes.sync_original();
    }

    /// Saves this document and its cached subtree.
    ///
    /// Returns `Ok(false)` when a hook vetoes or the root refuses the save.
    /// Validation failures propagate.
    pub fn save(&self) -> Result<bool> {
        let link = self.require_link()?;
        let doc_type = self.doc_type();
        debug!(
            doc_type = doc_type.name(),
            attribute = %link.path(),
            exists = self.exists(),
            "saving document"
        );

        if !self.pre_save()? {
            debug!(doc_type = doc_type.name(), "save vetoed");
            return Ok(false);
        }
        self.set_linked_data()?;
        if !link.persist()? {
            debug!(doc_type = doc_type.name(), "root refused save");
            return Ok(false);
        }
        self.post_save();
        debug!(doc_type = doc_type.name(), "document saved");
        Ok(true)
    }

    /// Empties this document and writes `null` to its link target.
    ///
    /// The instance stays usable. A document linked into a collection is
    /// removed from it.
    pub fn delete(&self) -> Result<bool> {
        let link = self.require_link()?;
        let doc_type = self.doc_type();
        debug!(doc_type = doc_type.name(), attribute = %link.path(), "deleting document");

        if self.fire(LifecycleEvent::Deleting).is_veto() {
            debug!(doc_type = doc_type.name(), "delete vetoed");
            return Ok(false);
        }

        let stale = {
            let mut inner = self.inner.borrow_mut();
            inner.attributes.clear();
            std::mem::take(&mut inner.cache)
        };
        drop(stale);

        link.write(Value::Null)?;
        if !link.persist()? {
            debug!(doc_type = doc_type.name(), "root refused delete");
            return Ok(false);
        }
        self.fire(LifecycleEvent::Deleted);
        self.mark_exists(false);
        Ok(true)
    }

    /// Assigns `values`, then saves.
    pub fn update(&self, values: Map<String, Value>) -> Result<bool> {
        self.fill(values)?;
        self.save()
    }

    /// Like [`Document::update`], but objects aimed at document attributes
    /// are merged into the existing child instead of replacing it.
    pub fn update_recursive(&self, values: Map<String, Value>) -> Result<bool> {
        self.apply_recursive(values)?;
        self.save()
    }

    fn apply_recursive(&self, values: Map<String, Value>) -> Result<()> {
        let doc_type = self.doc_type();
        for (key, value) in values {
            let is_document = doc_type
                .linked_attribute(&key)
                .is_some_and(|config| !config.is_collection);
            if is_document
                && let Value::Object(nested) = &value
                && let Attribute::Document(child) = self.get(&key)?
            {
                child.apply_recursive(nested.clone())?;
                continue;
            }
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// Applies `values` one key at a time, rolling back any key that leaves
    /// the document invalid or whose assignment is vetoed, then saves once.
    ///
    /// Keys are judged independently. Constraints spanning several
    /// attributes belong in [`Document::update`].
    pub fn safe_update(&self, values: Map<String, Value>) -> Result<bool> {
        let doc_type = self.doc_type();
        for (key, value) in values {
            let linked = doc_type.is_linked_attribute(&key);
            let previous = if linked {
                Some(self.get(&key)?)
            } else {
                self.inner.borrow().attributes.get(&key).cloned().map(Attribute::Value)
            };

            match self.set(&key, value) {
                Ok(()) => {}
                Err(err) if err.is_validation_error() || err.is_veto() => {
                    debug!(doc_type = doc_type.name(), attribute = %key, "skipping rejected attribute");
                    continue;
                }
                Err(err) => return Err(err),
            }

            match self.validate_or_throw() {
                Ok(()) => {}
                Err(err) if err.is_validation_error() => {
                    debug!(doc_type = doc_type.name(), attribute = %key, "rolling back invalid attribute");
                    match previous {
                        Some(previous) if linked && !previous.is_null() => self.set(&key, previous)?,
                        Some(Attribute::Value(raw)) if !linked => {
                            self.inner.borrow_mut().attributes.set_raw(&key, raw);
                        }
                        _ => self.unset(&key),
                    }
                }
                Err(err) => return Err(err),
            }
        }
        self.save()
    }

    /// Clears the cache and hydrates exactly the named linked attributes.
    pub fn with_json_model_attributes(&self, names: &[&str]) -> Result<()> {
        let doc_type = self.doc_type();
        if let Some(unknown) = names.iter().find(|name| !doc_type.is_linked_attribute(name)) {
            return Err(self.unknown_linked(unknown));
        }
        let stale = std::mem::take(&mut self.inner.borrow_mut().cache);
        drop(stale);
        for name in names {
            self.get(name)?;
        }
        Ok(())
    }

    /// Whether a linked attribute's serialized form differs from the last
    /// loaded or saved state. `null`, absent and empty compare equal.
    pub fn is_json_model_attribute_dirty(&self, name: &str) -> Result<bool> {
        let doc_type = self.doc_type();
        let config = doc_type
            .linked_attribute(name)
            .ok_or_else(|| self.unknown_linked(name))?;
        let attribute = config.host_attribute.as_str();
        let sub_key = config.host_sub_key.as_deref();

        let normalize = |value: Option<&Value>| match value {
            Some(value) if !is_blank(value) => value.clone(),
            _ => Value::Null,
        };

        let current = self.to_value();
        let current = normalize(current.as_object().and_then(|map| get_segment(map, attribute, sub_key)));
        let original = normalize(
            self.inner
                .borrow()
                .attributes
                .original_segment(attribute, sub_key),
        );
        Ok(!canonical_eq(&current, &original))
    }

    /// Whether a stored attribute differs from the last loaded or saved state.
    pub fn is_dirty(&self, key: &str) -> bool {
        self.inner.borrow().attributes.is_dirty(key)
    }

    pub fn dirty_keys(&self) -> Vec<String> {
        self.inner.borrow().attributes.dirty_keys()
    }

    /// Stored value of `key` as last loaded or saved.
    pub fn original(&self, key: &str) -> Option<Value> {
        self.inner.borrow().attributes.original_value(key).cloned()
    }

    /// Nearest ancestor document of the given type, looking through collections.
    pub fn get_ancestor_of_type(&self, type_name: &str) -> Option<Document> {
        let mut host = self.linked_to().map(|link| link.host().clone());
        while let Some(current) = host {
            host = match current {
                Host::Document(weak) => {
                    let doc = weak.upgrade()?;
                    if doc.type_name() == type_name {
                        return Some(doc);
                    }
                    doc.linked_to().map(|link| link.host().clone())
                }
                Host::Collection(weak) => weak.upgrade()?.linked_to().map(|link| link.host().clone()),
                Host::Root(_) => None,
            };
        }
        None
    }

    /// Whether the document directly hosting this one (through at most one
    /// collection) has the given type.
    pub fn is_linked_to_instance_of(&self, type_name: &str) -> bool {
        let Some(link) = self.linked_to() else {
            return false;
        };
        let host = match link.host() {
            Host::Collection(weak) => match weak.upgrade().and_then(|c| c.linked_to()) {
                Some(link) => link.host().clone(),
                None => return false,
            },
            other => other.clone(),
        };
        host.document().is_some_and(|doc| doc.type_name() == type_name)
    }

    /// The root collaborator at the top of the link chain.
    pub fn root(&self) -> Option<Rc<dyn Root>> {
        let mut host = self.linked_to().map(|link| link.host().clone());
        while let Some(current) = host {
            host = match current {
                Host::Root(root) => return Some(root),
                Host::Document(weak) => weak.upgrade()?.linked_to().map(|link| link.host().clone()),
                Host::Collection(weak) => weak.upgrade()?.linked_to().map(|link| link.host().clone()),
            };
        }
        None
    }
}

impl Linkable for Document {
    fn link(&self, host: Host, attribute: &str, sub_key: Option<&str>) {
        Document::link(self, host, attribute, sub_key);
    }

    fn unlink(&self) {
        Document::unlink(self);
    }

    fn is_linked(&self) -> bool {
        Document::is_linked(self)
    }

    fn get_linked_data(&self) -> Result<Value> {
        Document::get_linked_data(self)
    }

    fn set_linked_data(&self) -> Result<()> {
        Document::set_linked_data(self)
    }

    fn persist(&self) -> Result<bool> {
        Document::persist(self)
    }
}

impl Cascade for Document {
    fn pre_save(&self) -> Result<bool> {
        Document::pre_save(self)
    }

    fn post_save(&self) {
        Document::post_save(self);
    }

    fn validate_or_throw(&self) -> Result<()> {
        Document::validate_or_throw(self)
    }

    fn is_empty(&self) -> bool {
        Document::is_empty(self)
    }

    fn to_value(&self) -> Value {
        Document::to_value(self)
    }
}
