//! Collections of documents sharing one link target.
//!
//! A [`DocumentCollection`] holds documents of a single item type. Without a
//! primary key it is a plain sequence and members are addressed by position.
//! With a primary key members are indexed by that attribute's value and
//! duplicates are rejected.
//!
//! Either way the collection is stored in its host as a JSON array. Every
//! member is linked to the collection under its position or key, and links
//! are recomputed whenever membership changes.

use std::{
    cell::RefCell,
    cmp::Ordering,
    fmt,
    rc::{Rc, Weak},
};

use handle_trait::Handle;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    Result,
    canonical::{to_canonical_string, value_kind},
    document::{Attribute, Document},
    link::{Cascade, Host, Link, Linkable},
    registry::{DocumentType, Registry},
};

mod errors;

pub use errors::CollectionError;

/// Membership storage. Keyed members are indexed by primary-key value.
#[derive(Debug, Clone)]
enum Members {
    Sequence(Vec<Document>),
    Keyed {
        primary_key: String,
        items: IndexMap<String, Document>,
    },
}

/// Primary-key value of `doc` as a map key. Strings are used as-is, other
/// values by their canonical JSON text.
fn key_of(doc: &Document, primary_key: &str) -> Result<String> {
    match doc.value(primary_key)? {
        Value::Null => Err(CollectionError::MissingPrimaryKey {
            key: primary_key.to_string(),
        }
        .into()),
        Value::String(s) => Ok(s),
        other => Ok(to_canonical_string(&other)),
    }
}

impl Members {
    fn empty(primary_key: Option<&str>) -> Self {
        match primary_key {
            Some(key) => Members::Keyed {
                primary_key: key.to_string(),
                items: IndexMap::new(),
            },
            None => Members::Sequence(Vec::new()),
        }
    }

    fn primary_key(&self) -> Option<&str> {
        match self {
            Members::Sequence(_) => None,
            Members::Keyed { primary_key, .. } => Some(primary_key),
        }
    }

    fn len(&self) -> usize {
        match self {
            Members::Sequence(items) => items.len(),
            Members::Keyed { items, .. } => items.len(),
        }
    }

    fn insert(&mut self, doc: Document) -> Result<()> {
        match self {
            Members::Sequence(items) => items.push(doc),
            Members::Keyed { primary_key, items } => {
                let value = key_of(&doc, primary_key)?;
                if items.contains_key(&value) {
                    return Err(CollectionError::DuplicatePrimaryKey {
                        key: primary_key.clone(),
                        value,
                    }
                    .into());
                }
                items.insert(value, doc);
            }
        }
        Ok(())
    }

    fn documents(&self) -> Vec<Document> {
        match self {
            Members::Sequence(items) => items.clone(),
            Members::Keyed { items, .. } => items.values().cloned().collect(),
        }
    }

    /// Members with the link key each one is addressed by.
    fn entries(&self) -> Vec<(String, Document)> {
        match self {
            Members::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(index, doc)| (index.to_string(), doc.clone()))
                .collect(),
            Members::Keyed { items, .. } => items
                .iter()
                .map(|(key, doc)| (key.clone(), doc.clone()))
                .collect(),
        }
    }

    fn find(&self, key: &str) -> Option<Document> {
        match self {
            Members::Sequence(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)).cloned(),
            Members::Keyed { items, .. } => items.get(key).cloned(),
        }
    }

    fn remove(&mut self, key: &str) -> Option<Document> {
        match self {
            Members::Sequence(items) => {
                let index = key.parse::<usize>().ok().filter(|i| *i < items.len())?;
                Some(items.remove(index))
            }
            Members::Keyed { items, .. } => items.shift_remove(key),
        }
    }
}

struct CollectionInternal {
    registry: Registry,
    item_type: Option<Rc<DocumentType>>,
    members: Members,
    link: Option<Link>,
}

/// An ordered or primary-key-indexed group of documents. Cheap to clone;
/// clones share state.
#[derive(Clone, Handle)]
pub struct DocumentCollection {
    inner: Rc<RefCell<CollectionInternal>>,
}

/// Non-owning reference to a [`DocumentCollection`], held by its members.
#[derive(Clone, Handle)]
pub struct WeakCollection {
    inner: Weak<RefCell<CollectionInternal>>,
}

impl WeakCollection {
    pub fn upgrade(&self) -> Option<DocumentCollection> {
        self.inner.upgrade().map(|inner| DocumentCollection { inner })
    }
}

impl fmt::Debug for WeakCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakCollection")
    }
}

impl fmt::Debug for DocumentCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("DocumentCollection")
                .field("item_type", &inner.item_type.as_ref().map(|t| t.name()))
                .field("primary_key", &inner.members.primary_key())
                .field("len", &inner.members.len())
                .field("link", &inner.link.as_ref().map(Link::path))
                .finish(),
            Err(_) => f.write_str("DocumentCollection { <borrowed> }"),
        }
    }
}

impl Serialize for DocumentCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl DocumentCollection {
    /// An empty collection with no item type. [`DocumentCollection::set_type`]
    /// must be called before items are added.
    pub fn new(registry: &Registry) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CollectionInternal {
                registry: registry.handle(),
                item_type: None,
                members: Members::Sequence(Vec::new()),
                link: None,
            })),
        }
    }

    /// An empty collection of `type_name` documents.
    pub fn of_type(registry: &Registry, type_name: &str) -> Result<Self> {
        let collection = Self::new(registry);
        collection.set_type(type_name)?;
        Ok(collection)
    }

    /// Sets the item type. Only registered document types are accepted.
    pub fn set_type(&self, type_name: &str) -> Result<()> {
        let item_type = self.inner.borrow().registry.document_type(type_name)?;
        self.inner.borrow_mut().item_type = Some(item_type);
        Ok(())
    }

    pub fn item_type(&self) -> Result<Rc<DocumentType>> {
        self.inner
            .borrow()
            .item_type
            .clone()
            .ok_or_else(|| CollectionError::MissingItemType.into())
    }

    pub fn item_type_name(&self) -> Option<String> {
        self.inner
            .borrow()
            .item_type
            .as_ref()
            .map(|t| t.name().to_string())
    }

    pub fn primary_key(&self) -> Option<String> {
        self.inner.borrow().members.primary_key().map(str::to_string)
    }

    /// Switches between positional (`None`) and keyed indexing. Existing
    /// members are re-indexed; on a duplicate nothing changes.
    pub fn set_primary_key(&self, primary_key: Option<&str>) -> Result<()> {
        if self.primary_key().as_deref() == primary_key {
            return Ok(());
        }
        let mut members = Members::empty(primary_key);
        for doc in self.documents() {
            members.insert(doc)?;
        }
        self.inner.borrow_mut().members = members;
        self.reindex();
        Ok(())
    }

    fn coerce(&self, item: Attribute) -> Result<Document> {
        let item_type = self.item_type()?;
        match item {
            Attribute::Document(doc) if doc.type_name() == item_type.name() => Ok(doc),
            Attribute::Value(data @ Value::Object(_)) => {
                let registry = self.inner.borrow().registry.handle();
                Document::new(&registry, item_type.name(), data)
            }
            other => Err(CollectionError::WrongItemType {
                expected: item_type.name().to_string(),
                actual: other.describe(),
            }
            .into()),
        }
    }

    fn coerce_all<I>(&self, items: I) -> Result<Vec<Document>>
    where
        I: IntoIterator,
        I::Item: Into<Attribute>,
    {
        items
            .into_iter()
            .map(|item| self.coerce(item.into()))
            .collect()
    }

    /// Replaces every member. Items are treated as already persisted.
    ///
    /// Either every item is accepted or the collection is unchanged.
    pub fn fill<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Attribute>,
    {
        let docs = self.coerce_all(items)?;
        let mut members = Members::empty(self.primary_key().as_deref());
        for doc in &docs {
            members.insert(doc.clone())?;
        }
        for doc in &docs {
            doc.mark_loaded();
        }
        self.inner.borrow_mut().members = members;
        self.reindex();
        Ok(())
    }

    /// [`DocumentCollection::fill`] from stored data: `null` is empty, an
    /// array is taken in order, and an object's values are taken in order.
    pub fn fill_from_value(&self, data: Value) -> Result<()> {
        match data {
            Value::Null => self.fill(Vec::<Value>::new()),
            Value::Array(items) => self.fill(items),
            Value::Object(map) => self.fill(map.into_iter().map(|(_, item)| item)),
            other => Err(CollectionError::NotASequence {
                actual: value_kind(&other).to_string(),
            }
            .into()),
        }
    }

    /// Replaces every member with the data at the link target.
    pub fn fresh(&self) -> Result<()> {
        let data = self.get_linked_data()?;
        self.fill_from_value(data)
    }

    /// Appends one new item.
    pub fn push(&self, item: impl Into<Attribute>) -> Result<()> {
        self.push_all([item.into()])
    }

    /// Appends new items. Either every item is accepted or the collection is
    /// unchanged.
    pub fn push_all<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Attribute>,
    {
        let docs = self.coerce_all(items)?;
        let mut members = self.inner.borrow().members.clone();
        for doc in docs {
            members.insert(doc)?;
        }
        self.inner.borrow_mut().members = members;
        self.reindex();
        Ok(())
    }

    /// Relinks every member to its current position or key.
    fn reindex(&self) {
        let entries = self.inner.borrow().members.entries();
        trace!(
            item_type = ?self.item_type_name(),
            members = entries.len(),
            "reindexing collection"
        );
        for (key, doc) in entries {
            doc.link(Host::from(self), &key, None);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Member at a position, for either indexing mode.
    pub fn get(&self, index: usize) -> Option<Document> {
        match &self.inner.borrow().members {
            Members::Sequence(items) => items.get(index).cloned(),
            Members::Keyed { items, .. } => items.get_index(index).map(|(_, doc)| doc.clone()),
        }
    }

    /// Member by logical key: a position for sequences, a primary-key value
    /// for keyed collections.
    pub fn find(&self, key: &str) -> Option<Document> {
        self.inner.borrow().members.find(key)
    }

    pub fn first(&self) -> Option<Document> {
        self.get(0)
    }

    pub fn documents(&self) -> Vec<Document> {
        self.inner.borrow().members.documents()
    }

    pub fn iter(&self) -> impl Iterator<Item = Document> {
        self.documents().into_iter()
    }

    /// Removes a member by logical key and reindexes the rest.
    pub fn remove(&self, key: &str) -> Option<Document> {
        let removed = self.inner.borrow_mut().members.remove(key)?;
        removed.unlink();
        self.reindex();
        Some(removed)
    }

    fn derived(&self, docs: Vec<Document>) -> Self {
        let inner = self.inner.borrow();
        let members = match &inner.members {
            Members::Sequence(_) => Members::Sequence(docs),
            Members::Keyed { primary_key, items } => Members::Keyed {
                primary_key: primary_key.clone(),
                items: docs
                    .into_iter()
                    .filter_map(|doc| {
                        items
                            .iter()
                            .find(|(_, member)| member.ptr_eq(&doc))
                            .map(|(key, _)| (key.clone(), doc))
                    })
                    .collect(),
            },
        };
        Self {
            inner: Rc::new(RefCell::new(CollectionInternal {
                registry: inner.registry.handle(),
                item_type: inner.item_type.clone(),
                members,
                link: None,
            })),
        }
    }

    /// A new, unlinked collection of the members matching `predicate`.
    ///
    /// Members are shared with this collection and keep their links here.
    pub fn filter(&self, predicate: impl Fn(&Document) -> bool) -> Self {
        let docs = self.documents().into_iter().filter(|doc| predicate(doc)).collect();
        self.derived(docs)
    }

    /// A new, unlinked collection with the members in `compare` order.
    ///
    /// Members are shared with this collection and keep their links here.
    pub fn sort_by(&self, compare: impl FnMut(&Document, &Document) -> Ordering) -> Self {
        let mut docs = self.documents();
        docs.sort_by(compare);
        self.derived(docs)
    }

    /// Always a JSON array, in member order.
    pub fn to_value(&self) -> Value {
        Value::Array(self.documents().iter().map(Document::to_value).collect())
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    pub fn ptr_eq(&self, other: &DocumentCollection) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakCollection {
        WeakCollection {
            inner: Rc::downgrade(&self.inner),
        }
    }

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
            CollectionError::NotLinked {
                item_type: self.item_type_name().unwrap_or_default(),
            }
            .into()
        })
    }

    /// Current value at the link target.
    pub fn get_linked_data(&self) -> Result<Value> {
        self.require_link()?.read()
    }

    /// Folds every member's state, then writes the array into the host.
    pub fn set_linked_data(&self) -> Result<()> {
        let link = self.require_link()?;
        for doc in self.documents() {
            doc.set_linked_data()?;
        }
        link.write(self.to_value())
    }

    pub fn persist(&self) -> Result<bool> {
        let link = self.require_link()?;
        self.set_linked_data()?;
        link.persist()
    }

    /// Stored value of one member, looked up in the data at the link target.
    pub(crate) fn read_member(&self, key: &str) -> Result<Value> {
        let data = self.get_linked_data()?;
        let primary_key = self.primary_key();
        let found = match data {
            Value::Array(items) => match primary_key {
                None => key.parse::<usize>().ok().and_then(|i| items.into_iter().nth(i)),
                Some(primary_key) => items.into_iter().find(|item| match item.get(&primary_key) {
                    Some(Value::String(s)) => s == key,
                    Some(value) if !value.is_null() => to_canonical_string(value) == key,
                    _ => false,
                }),
            },
            Value::Object(mut map) => map.remove(key),
            _ => None,
        };
        Ok(found.unwrap_or(Value::Null))
    }

    /// A member writing itself back. Members are the source of truth, so an
    /// existing member is left alone; `null` removes it and an unknown key is
    /// added as a new member.
    pub(crate) fn write_member(&self, key: &str, value: Value) -> Result<()> {
        let present = self.find(key).is_some();
        match (present, value.is_null()) {
            (true, true) => {
                debug!(key, "removing deleted member");
                self.remove(key);
                Ok(())
            }
            (true, false) | (false, true) => Ok(()),
            (false, false) => self.push(value),
        }
    }

    pub fn validate_or_throw(&self) -> Result<()> {
        for doc in self.documents() {
            doc.validate_or_throw()?;
        }
        Ok(())
    }

    /// Runs every member's pre-save cascade, stopping at the first veto.
    pub fn pre_save(&self) -> Result<bool> {
        for doc in self.documents() {
            if !doc.pre_save()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn post_save(&self) {
        for doc in self.documents() {
            doc.post_save();
        }
    }

    /// Saves every member and the collection's own link target.
    pub fn save(&self) -> Result<bool> {
        let link = self.require_link()?;
        debug!(
            item_type = ?self.item_type_name(),
            attribute = %link.path(),
            members = self.len(),
            "saving collection"
        );
        if !self.pre_save()? {
            debug!("collection save vetoed");
            return Ok(false);
        }
        self.set_linked_data()?;
        if !link.persist()? {
            return Ok(false);
        }
        self.post_save();
        Ok(true)
    }
}

impl Linkable for DocumentCollection {
    fn link(&self, host: Host, attribute: &str, sub_key: Option<&str>) {
        DocumentCollection::link(self, host, attribute, sub_key);
    }

    fn unlink(&self) {
        DocumentCollection::unlink(self);
    }

    fn is_linked(&self) -> bool {
        DocumentCollection::is_linked(self)
    }

    fn get_linked_data(&self) -> Result<Value> {
        DocumentCollection::get_linked_data(self)
    }

    fn set_linked_data(&self) -> Result<()> {
        DocumentCollection::set_linked_data(self)
    }

    fn persist(&self) -> Result<bool> {
        DocumentCollection::persist(self)
    }
}

impl Cascade for DocumentCollection {
    fn pre_save(&self) -> Result<bool> {
        DocumentCollection::pre_save(self)
    }

    fn post_save(&self) {
        DocumentCollection::post_save(self);
    }

    fn validate_or_throw(&self) -> Result<()> {
        DocumentCollection::validate_or_throw(self)
    }

    fn is_empty(&self) -> bool {
        DocumentCollection::is_empty(self)
    }

    fn to_value(&self) -> Value {
        DocumentCollection::to_value(self)
    }
}
