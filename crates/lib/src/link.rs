//! Links between documents and their hosts.
//!
//! A [`Link`] is the `(host, attribute, sub_key)` triple naming where a
//! document's serialized form lives. The host is a [`Root`] collaborator, a
//! [`Document`] or a [`DocumentCollection`], so links chain to arbitrary depth:
//!
//! ```text
//! Root ── "garage" ──> Garage ── "cars" ──> Collection<Car> ── "0" ──> Car
//! ```
//!
//! Hosts expose three operations to their linked children:
//!
//! * **read** the current value at the link path,
//! * **write** a new value at the link path into the host's in-memory state,
//! * **persist** the host itself one hop further up, recursively, until the
//!   root collaborator's `save()` commits.
//!
//! Parents own their cached children; children only hold weak references to
//! document and collection hosts. A root is held strongly.

use std::{fmt, rc::Rc};

use serde_json::{Map, Value};

use crate::{
    Document, DocumentCollection, Result,
    attributes::{get_segment, set_segment},
    collection::WeakCollection,
    document::{DocumentError, WeakDocument},
    root::Root,
};

/// The object a link points into.
#[derive(Clone)]
pub enum Host {
    Root(Rc<dyn Root>),
    Document(WeakDocument),
    Collection(WeakCollection),
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Root(_) => f.write_str("Host::Root"),
            Host::Document(_) => f.write_str("Host::Document"),
            Host::Collection(_) => f.write_str("Host::Collection"),
        }
    }
}

impl Host {
    /// Wraps an already type-erased root collaborator.
    pub fn root(root: Rc<dyn Root>) -> Self {
        Host::Root(root)
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Host::Root(_))
    }

    /// The host document, if this host is a live document.
    pub fn document(&self) -> Option<Document> {
        match self {
            Host::Document(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// The host collection, if this host is a live collection.
    pub fn collection(&self) -> Option<DocumentCollection> {
        match self {
            Host::Collection(weak) => weak.upgrade(),
            _ => None,
        }
    }

    fn dropped() -> crate::Error {
        DocumentError::HostDropped.into()
    }
}

impl<R: Root + 'static> From<Rc<R>> for Host {
    fn from(root: Rc<R>) -> Self {
        Host::Root(root)
    }
}

impl From<&Document> for Host {
    fn from(doc: &Document) -> Self {
        Host::Document(doc.downgrade())
    }
}

impl From<&DocumentCollection> for Host {
    fn from(collection: &DocumentCollection) -> Self {
        Host::Collection(collection.downgrade())
    }
}

/// Location of a document's data inside its host.
#[derive(Clone, Debug)]
pub struct Link {
    host: Host,
    attribute: String,
    sub_key: Option<String>,
}

impl Link {
    pub fn new(host: impl Into<Host>, attribute: impl Into<String>, sub_key: Option<String>) -> Self {
        Self {
            host: host.into(),
            attribute: attribute.into(),
            sub_key,
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn sub_key(&self) -> Option<&str> {
        self.sub_key.as_deref()
    }

    /// Dotted path of the link inside its host, e.g. `details.address`.
    pub fn path(&self) -> String {
        match &self.sub_key {
            Some(key) => format!("{}.{key}", self.attribute),
            None => self.attribute.clone(),
        }
    }

    /// Current value at the link path; `null` when absent.
    pub(crate) fn read(&self) -> Result<Value> {
        match &self.host {
            Host::Root(root) => {
                let Some(value) = root.get_attribute(&self.attribute) else {
                    return Ok(Value::Null);
                };
                Ok(match self.sub_key() {
                    None => value,
                    Some(key) => {
                        let mut wrapper = Map::new();
                        wrapper.insert(self.attribute.clone(), value);
                        get_segment(&wrapper, &self.attribute, Some(key))
                            .cloned()
                            .unwrap_or(Value::Null)
                    }
                })
            }
            Host::Document(weak) => {
                let host = weak.upgrade().ok_or_else(Host::dropped)?;
                Ok(host.read_segment(&self.attribute, self.sub_key()))
            }
            Host::Collection(weak) => {
                let host = weak.upgrade().ok_or_else(Host::dropped)?;
                host.read_member(&self.attribute)
            }
        }
    }

    /// Writes `value` at the link path into the host's in-memory state.
    /// Sibling data under the same host attribute is preserved.
    pub(crate) fn write(&self, value: Value) -> Result<()> {
        match &self.host {
            Host::Root(root) => {
                let value = match self.sub_key() {
                    None => value,
                    Some(key) => {
                        let mut wrapper = Map::new();
                        if let Some(current) = root.get_attribute(&self.attribute) {
                            wrapper.insert(self.attribute.clone(), current);
                        }
                        set_segment(&mut wrapper, &self.attribute, Some(key), value);
                        wrapper.remove(&self.attribute).unwrap_or(Value::Null)
                    }
                };
                root.set_attribute(&self.attribute, value);
                Ok(())
            }
            Host::Document(weak) => {
                let host = weak.upgrade().ok_or_else(Host::dropped)?;
                host.write_segment(&self.attribute, self.sub_key(), value);
                Ok(())
            }
            Host::Collection(weak) => {
                let host = weak.upgrade().ok_or_else(Host::dropped)?;
                host.write_member(&self.attribute, value)
            }
        }
    }

    /// Pushes the host's own state one hop up and recurses until the root
    /// collaborator commits. Returns the root's save result.
    pub(crate) fn persist(&self) -> Result<bool> {
        match &self.host {
            Host::Root(root) => root.save(),
            Host::Document(weak) => weak.upgrade().ok_or_else(Host::dropped)?.persist(),
            Host::Collection(weak) => weak.upgrade().ok_or_else(Host::dropped)?.persist(),
        }
    }
}

/// Objects whose data lives at a [`Link`].
pub trait Linkable {
    /// Points this object at `host[attribute]` or `host[attribute][sub_key]`.
    fn link(&self, host: Host, attribute: &str, sub_key: Option<&str>);

    fn unlink(&self);

    fn is_linked(&self) -> bool;

    /// Current value at the link target, without touching local state.
    fn get_linked_data(&self) -> Result<Value>;

    /// Folds cached children into local state, validates, and writes the
    /// serialized result into the host.
    fn set_linked_data(&self) -> Result<()>;

    /// `set_linked_data` followed by the host's own persist.
    fn persist(&self) -> Result<bool>;
}

/// Objects that take part in cascaded lifecycles.
pub trait Cascade {
    /// Fires the pre-save hooks here and below. `Ok(false)` on veto.
    fn pre_save(&self) -> Result<bool>;

    /// Fires the post-save hooks here and below and resnapshots state.
    fn post_save(&self);

    fn validate_or_throw(&self) -> Result<()>;

    fn is_empty(&self) -> bool;

    fn to_value(&self) -> Value;
}
