//! Subcommand implementations.

pub mod check;
pub mod set;
pub mod show;

use std::rc::Rc;

use docmap::{Document, JsonFileRoot, Registry, registry::RegistryConfig};
use tracing::debug;

use crate::cli::TargetArgs;

/// A document opened from a record file.
pub struct Target {
    pub root: Rc<JsonFileRoot>,
    pub document: Document,
}

/// Load the registry, open the record file and link the document.
pub fn open(args: &TargetArgs) -> Result<Target, Box<dyn std::error::Error>> {
    let registry = match &args.config {
        Some(path) => Registry::from_config(&RegistryConfig::from_path(path)?)?,
        None => Registry::builder().build()?,
    };
    debug!(types = ?registry.type_names(), "registry loaded");

    let root = Rc::new(JsonFileRoot::open(&args.file)?);
    let document = match &args.key {
        Some(key) => Document::linked_at(
            &registry,
            &args.doc_type,
            root.clone(),
            &args.attribute,
            key,
        )?,
        None => Document::linked(&registry, &args.doc_type, root.clone(), &args.attribute)?,
    };

    Ok(Target { root, document })
}
