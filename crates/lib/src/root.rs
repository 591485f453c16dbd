//! Root persistence collaborators.
//!
//! A [`Root`] is the record at the top of a link chain, for example a database
//! row holding a JSON column. Documents read from and write into its named
//! attributes, and its [`Root::save`] is the only call that commits data.
//!
//! Two implementations ship with the crate: [`MemoryRoot`] keeps the record in
//! memory and counts saves, and [`JsonFileRoot`] keeps it in a JSON file.

use std::{
    cell::{Cell, RefCell},
    fs,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{Result, canonical};

/// Errors produced by the bundled root implementations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RootError {
    /// Root data must be a JSON object of named attributes
    #[error("Root data in '{source_name}' is not a JSON object")]
    NotAnObject { source_name: String },
}

impl RootError {
    pub fn is_format_error(&self) -> bool {
        matches!(self, RootError::NotAnObject { .. })
    }
}

impl From<RootError> for crate::Error {
    fn from(err: RootError) -> Self {
        crate::Error::Root(err)
    }
}

/// The outermost persistence target of a link chain.
///
/// Attribute access uses `&self`; implementations hold their state behind
/// interior mutability so a root can be shared by every document linked to it.
pub trait Root {
    /// Current value of a named attribute, `None` if absent.
    fn get_attribute(&self, name: &str) -> Option<Value>;

    /// Replaces a named attribute in memory. Nothing is committed until `save`.
    fn set_attribute(&self, name: &str, value: Value);

    /// Commits the record. `Ok(false)` means the save was refused.
    fn save(&self) -> Result<bool>;
}

fn object_or_error(value: Value, source_name: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(RootError::NotAnObject {
            source_name: source_name.to_string(),
        }
        .into()),
    }
}

/// An in-memory record. Useful as a stand-in for a database row.
#[derive(Debug, Default)]
pub struct MemoryRoot {
    data: RefCell<Map<String, Value>>,
    saves: Cell<usize>,
    refuse_saves: Cell<bool>,
}

impl MemoryRoot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root from a JSON object (or `null` for an empty record).
    pub fn from_value(value: Value) -> Result<Self> {
        let data = object_or_error(value, "memory")?;
        Ok(Self {
            data: RefCell::new(data),
            ..Self::default()
        })
    }

    /// Clone of one attribute.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.data.borrow().get(name).cloned()
    }

    /// The whole record as a JSON object.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.data.borrow().clone())
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    /// Makes subsequent saves return `Ok(false)` until switched back.
    pub fn refuse_saves(&self, refuse: bool) {
        self.refuse_saves.set(refuse);
    }
}

impl Root for MemoryRoot {
    fn get_attribute(&self, name: &str) -> Option<Value> {
        self.attribute(name)
    }

    fn set_attribute(&self, name: &str, value: Value) {
        self.data.borrow_mut().insert(name.to_string(), value);
    }

    fn save(&self) -> Result<bool> {
        if self.refuse_saves.get() {
            tracing::debug!("memory root refused save");
            return Ok(false);
        }
        self.saves.set(self.saves.get() + 1);
        Ok(true)
    }
}

/// A record stored as a JSON object in a file.
///
/// The file is read once on [`JsonFileRoot::open`] and rewritten on every
/// successful save. Writes go to a sibling temp file which is then renamed over
/// the original.
#[derive(Debug)]
pub struct JsonFileRoot {
    path: PathBuf,
    data: RefCell<Map<String, Value>>,
}

impl JsonFileRoot {
    /// Opens `path`, treating a missing file as an empty record.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                Map::new()
            } else {
                object_or_error(canonical::decode(&text)?, &path.display().to_string())?
            }
        } else {
            Map::new()
        };
        tracing::debug!(path = %path.display(), attributes = data.len(), "opened json root");
        Ok(Self {
            path,
            data: RefCell::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole record as a JSON object.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.data.borrow().clone())
    }
}

impl Root for JsonFileRoot {
    fn get_attribute(&self, name: &str) -> Option<Value> {
        self.data.borrow().get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: Value) {
        self.data.borrow_mut().insert(name.to_string(), value);
    }

    fn save(&self) -> Result<bool> {
        let text = serde_json::to_string_pretty(&*self.data.borrow())?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "saved json root");
        Ok(true)
    }
}
