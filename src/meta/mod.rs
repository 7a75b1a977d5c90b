//! Document-type specific metadata
//!
//! Each supported document type has a [`MetaHandler`] that turns the custom
//! metadata fields selected in the UI into a template object, validates it,
//! and renders it to XML. Handlers are registered once, keyed by the closed
//! [`DocType`] set; the custom-metadata pipeline resolves one per request.

mod fields;
mod handlers;

pub use fields::{FieldKind, FieldSpecHandler, MetaField};
pub use handlers::{act_handler, doc_handler, judgment_handler};

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::document::FieldError;
use crate::error::MetaError;
use crate::render::XmlRenderer;

/// Document types with custom metadata support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocType {
    Act,
    Judgment,
    Doc,
}

impl DocType {
    pub const ALL: [DocType; 3] = [DocType::Act, DocType::Judgment, DocType::Doc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Act => "act",
            Self::Judgment => "judgment",
            Self::Doc => "doc",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = MetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "act" => Ok(Self::Act),
            "judgment" => Ok(Self::Judgment),
            "doc" => Ok(Self::Doc),
            other => Err(MetaError::UnsupportedDocType(other.to_string())),
        }
    }
}

/// Per-type custom metadata behaviour
pub trait MetaHandler: Send + Sync {
    fn doc_type(&self) -> DocType;

    /// Build the template object from the selected custom metadata values
    fn to_template_object(&self, selected: &Map<String, Value>) -> Value;

    /// Validate the fields named in `selected`; all failures are reported
    fn validate(&self, object: &Value, selected: &[String]) -> Result<(), Vec<FieldError>>;

    /// Render the template object to XML
    fn to_xml(&self, object: &Value, renderer: &dyn XmlRenderer) -> Result<String, MetaError>;
}

/// Handlers keyed by document type
#[derive(Clone, Default)]
pub struct MetaRegistry {
    handlers: HashMap<DocType, Arc<dyn MetaHandler>>,
}

impl MetaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a handler for every [`DocType`]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(act_handler()));
        registry.register(Arc::new(judgment_handler()));
        registry.register(Arc::new(doc_handler()));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn MetaHandler>) {
        self.handlers.insert(handler.doc_type(), handler);
    }

    /// Find the handler for a document type name
    pub fn resolve(&self, doc_type: &str) -> Result<Arc<dyn MetaHandler>, MetaError> {
        let key: DocType = doc_type.parse()?;
        self.handlers
            .get(&key)
            .cloned()
            .ok_or_else(|| MetaError::UnsupportedDocType(doc_type.to_string()))
    }

    /// Registered types, sorted
    pub fn doc_types(&self) -> Vec<DocType> {
        let mut types: Vec<DocType> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }
}

impl fmt::Debug for MetaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaRegistry")
            .field("doc_types", &self.doc_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_all_types() {
        let registry = MetaRegistry::standard();
        assert_eq!(registry.doc_types(), DocType::ALL.to_vec());
        for doc_type in DocType::ALL {
            assert_eq!(registry.resolve(doc_type.as_str()).unwrap().doc_type(), doc_type);
        }
    }

    #[test]
    fn test_unknown_type() {
        let registry = MetaRegistry::standard();
        assert!(matches!(
            registry.resolve("bill"),
            Err(MetaError::UnsupportedDocType(t)) if t == "bill"
        ));
        assert!(matches!(
            MetaRegistry::new().resolve("act"),
            Err(MetaError::UnsupportedDocType(_))
        ));
    }
}
