//! Document type declarations.

use std::{collections::BTreeMap, rc::Rc};

use indexmap::IndexMap;
use serde_json::Value;

use super::RegistryError;
use crate::{
    attributes::Cast,
    canonical::value_kind,
    hooks::{Dispatcher, HookOutcome, LifecycleEvent},
    Document,
};

/// Where a linked attribute's data lives in its host, and what it hydrates to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAttribute {
    /// Registered name of the child document type (the item type for collections).
    pub child_type: String,
    /// Attribute of the host holding the child's data.
    pub host_attribute: String,
    /// Optional key inside `host_attribute`.
    pub host_sub_key: Option<String>,
    pub is_collection: bool,
    /// Primary key of collection items. Only meaningful for collections.
    pub primary_key: Option<String>,
}

impl LinkedAttribute {
    /// A single child document stored at `host[host_attribute]`.
    pub fn document(child_type: impl Into<String>, host_attribute: impl Into<String>) -> Self {
        Self {
            child_type: child_type.into(),
            host_attribute: host_attribute.into(),
            host_sub_key: None,
            is_collection: false,
            primary_key: None,
        }
    }

    /// A collection of `item_type` documents stored as a JSON array.
    pub fn collection(item_type: impl Into<String>, host_attribute: impl Into<String>) -> Self {
        Self {
            is_collection: true,
            ..Self::document(item_type, host_attribute)
        }
    }

    /// Store the data at `host[host_attribute][key]` instead.
    pub fn sub_key(mut self, key: impl Into<String>) -> Self {
        self.host_sub_key = Some(key.into());
        self
    }

    /// Index collection items by this attribute and reject duplicates.
    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    /// Parses the positional declaration form
    /// `[child_type, host_attribute, sub_key?, is_collection?, primary_key?]`.
    ///
    /// Missing or `null` optional slots take their defaults. Anything else
    /// is reported as [`RegistryError::MalformedLink`].
    ///
    /// ```
    /// use docmap::registry::LinkedAttribute;
    /// use serde_json::json;
    ///
    /// let link = LinkedAttribute::from_tuple("Garage", "cars", &json!(["Car", "cars", null, true, "vin"]))?;
    /// assert!(link.is_collection);
    /// assert_eq!(link.primary_key.as_deref(), Some("vin"));
    ///
    /// assert!(LinkedAttribute::from_tuple("Garage", "cars", &json!(["Car"])).is_err());
    /// # Ok::<(), docmap::registry::RegistryError>(())
    /// ```
    pub fn from_tuple(
        doc_type: &str,
        attribute: &str,
        raw: &Value,
    ) -> Result<Self, RegistryError> {
        let malformed = |reason: String| RegistryError::MalformedLink {
            doc_type: doc_type.to_string(),
            attribute: attribute.to_string(),
            reason,
        };

        let Value::Array(slots) = raw else {
            return Err(malformed(format!(
                "expected an array of 2 to 5 elements, found {}",
                value_kind(raw)
            )));
        };
        if !(2..=5).contains(&slots.len()) {
            return Err(malformed(format!(
                "expected 2 to 5 elements, found {}",
                slots.len()
            )));
        }

        let required_str = |index: usize, name: &str| -> Result<String, RegistryError> {
            match &slots[index] {
                Value::String(s) if !s.is_empty() => Ok(s.clone()),
                other => Err(malformed(format!(
                    "{name} must be a non-empty string, found {}",
                    value_kind(other)
                ))),
            }
        };
        let optional_str = |index: usize, name: &str| -> Result<Option<String>, RegistryError> {
            match slots.get(index) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(Value::Number(n)) => Ok(Some(n.to_string())),
                Some(other) => Err(malformed(format!(
                    "{name} must be a string or null, found {}",
                    value_kind(other)
                ))),
            }
        };

        let child_type = required_str(0, "child type")?;
        let host_attribute = required_str(1, "host attribute")?;
        let host_sub_key = optional_str(2, "sub key")?;
        let is_collection = match slots.get(3) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(malformed(format!(
                    "collection flag must be a boolean, found {}",
                    value_kind(other)
                )));
            }
        };
        let primary_key = optional_str(4, "primary key")?;
        if primary_key.is_some() && !is_collection {
            return Err(malformed(
                "a primary key is only valid on a collection".to_string(),
            ));
        }

        Ok(Self {
            child_type,
            host_attribute,
            host_sub_key,
            is_collection,
            primary_key,
        })
    }
}

/// Declaration of one document type: linked attributes, casts, schema,
/// lifecycle hooks and the nested-null policy.
///
/// Types are assembled with the chained builder methods and then handed to a
/// [`RegistryBuilder`](super::RegistryBuilder). Once registered they are
/// immutable.
#[derive(Debug, Clone)]
pub struct DocumentType {
    name: String,
    linked: IndexMap<String, LinkedAttribute>,
    casts: Rc<BTreeMap<String, Cast>>,
    nullable_when_empty: bool,
    schema: Option<Value>,
    dispatcher: Dispatcher,
}

impl DocumentType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            linked: IndexMap::new(),
            casts: Rc::new(BTreeMap::new()),
            nullable_when_empty: false,
            schema: None,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Declares a linked attribute. Declaration order is cascade order.
    pub fn link(mut self, attribute: impl Into<String>, config: LinkedAttribute) -> Self {
        self.linked.insert(attribute.into(), config);
        self
    }

    /// Declares a linked attribute from its positional tuple form.
    pub fn link_tuple(self, attribute: &str, raw: &Value) -> Result<Self, RegistryError> {
        let config = LinkedAttribute::from_tuple(&self.name, attribute, raw)?;
        Ok(self.link(attribute, config))
    }

    pub fn cast(mut self, attribute: impl Into<String>, cast: Cast) -> Self {
        Rc::make_mut(&mut self.casts).insert(attribute.into(), cast);
        self
    }

    /// When set, reading this type as a nested attribute yields `null`
    /// instead of an empty instance.
    pub fn nullable_when_empty(mut self, nullable: bool) -> Self {
        self.nullable_when_empty = nullable;
        self
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Registers a lifecycle hook.
    pub fn on<F, R>(mut self, event: LifecycleEvent, hook: F) -> Self
    where
        F: Fn(&Document) -> R + 'static,
        R: Into<HookOutcome>,
    {
        self.dispatcher.listen(event, hook);
        self
    }

    pub(crate) fn listen<F, R>(&mut self, event: LifecycleEvent, hook: F)
    where
        F: Fn(&Document) -> R + 'static,
        R: Into<HookOutcome>,
    {
        self.dispatcher.listen(event, hook);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves a linked attribute. A direct map lookup.
    pub fn linked_attribute(&self, attribute: &str) -> Option<&LinkedAttribute> {
        self.linked.get(attribute)
    }

    pub fn is_linked_attribute(&self, attribute: &str) -> bool {
        self.linked.contains_key(attribute)
    }

    /// Linked attributes in declaration order.
    pub fn linked_attributes(&self) -> impl Iterator<Item = (&str, &LinkedAttribute)> {
        self.linked.iter().map(|(name, config)| (name.as_str(), config))
    }

    pub fn has_linked_attributes(&self) -> bool {
        !self.linked.is_empty()
    }

    pub fn casts(&self) -> &Rc<BTreeMap<String, Cast>> {
        &self.casts
    }

    pub fn is_nullable_when_empty(&self) -> bool {
        self.nullable_when_empty
    }

    pub fn schema_value(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    /// Whether documents of this type are validated before being written.
    pub fn supports_validation(&self) -> bool {
        self.schema.is_some()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
