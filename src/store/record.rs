//! Log record types
//!
//! A record is a schema-free JSON document stamped with the position the
//! store assigned on append. Positions realise natural (insertion) order.

use std::sync::Arc;

use serde_json::{Map, Value};

/// Schema-free record body
pub type Document = Map<String, Value>;

/// Name of a collection inside a store
///
/// Cheap to clone; obtained from [`LogStore::collection`](super::LogStore::collection).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    name: Arc<str>,
}

impl CollectionHandle {
    /// Create a handle for the named collection
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A record read from a capped log
///
/// Immutable once appended. The document is reference counted, so cloning a
/// record for several subscribers never copies the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    position: u64,
    document: Arc<Document>,
}

impl Record {
    /// Create a record at the given position
    pub fn new(position: u64, document: Document) -> Self {
        Self {
            position,
            document: Arc::new(document),
        }
    }

    /// Position in natural order
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Record body
    #[inline]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Look up a top-level field
    #[inline]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.document.get(field)
    }
}

/// Convert a JSON value into a document
///
/// Returns `None` unless the value is an object.
pub fn into_document(value: Value) -> Option<Document> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
