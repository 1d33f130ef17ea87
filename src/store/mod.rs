//! Storage seam: backend trait, connections and document references.
//!
//! The model layer talks to storage through [`StorageBackend`], a small
//! collection-level document API. A [`Connection`] wraps a backend together
//! with the per-model field cache. Models receive a connection explicitly, or
//! fall back to the process-wide one installed with
//! [`set_global_connection`].

pub mod memory;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, StoreError};
use crate::schema::ModelSchema;

/// A schemaless document as stored: a plain key/value mapping.
pub type RawDocument = serde_json::Map<String, Value>;

/// Process-wide fallback connection - installed once, first writer wins.
static GLOBAL_CONNECTION: OnceLock<Arc<Connection>> = OnceLock::new();

/// Install the process-wide default connection. Returns `false` when a
/// connection is already installed; the existing one stays in place.
pub fn set_global_connection(backend: Arc<dyn StorageBackend>) -> bool {
    GLOBAL_CONNECTION
        .set(Arc::new(Connection::new(backend)))
        .is_ok()
}

/// The process-wide default connection, if one has been installed.
pub fn global_connection() -> Result<Arc<Connection>, ModelError> {
    GLOBAL_CONNECTION
        .get()
        .cloned()
        .ok_or(ModelError::MissingConnection)
}

/// A typed `{$ref, $id}` document reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocRef {
    #[serde(rename = "$ref")]
    pub collection: String,
    #[serde(rename = "$id")]
    pub id: Value,
}

impl DocRef {
    pub fn new(collection: &str, id: Value) -> Self {
        Self {
            collection: collection.to_string(),
            id,
        }
    }

    /// Reads a reference out of a raw value. Extra keys (`$db` and friends)
    /// are tolerated; both `$ref` and `$id` must be present.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn is_ref(value: &Value) -> bool {
        Self::from_value(value).is_some()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// How a stored join value participates in a relation lookup.
#[derive(Debug, Clone)]
pub enum JoinKey {
    /// A single document reference, dereferenced directly.
    Reference(DocRef),
    /// A list of references, each dereferenced; unresolvable items are skipped.
    ReferenceList(Vec<DocRef>),
    /// A list of plain values, matched with an `$in` clause.
    Keys(Vec<Value>),
    /// One plain value, matched by equality.
    Key(Value),
}

impl JoinKey {
    /// Classify a stored join value. A list counts as a reference list when
    /// its first element is a reference.
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                if items.first().map_or(false, DocRef::is_ref) {
                    Self::ReferenceList(items.iter().filter_map(DocRef::from_value).collect())
                } else {
                    Self::Keys(items)
                }
            }
            other => match DocRef::from_value(&other) {
                Some(reference) => Self::Reference(reference),
                None => Self::Key(other),
            },
        }
    }
}

/// A lazy stream of raw documents. Nothing is fetched or materialized until
/// the cursor is iterated.
pub struct Cursor {
    items: Box<dyn Iterator<Item = Result<Value, StoreError>> + Send>,
}

impl Cursor {
    pub fn new<I>(items: I) -> Self
    where
        I: Iterator<Item = Result<Value, StoreError>> + Send + 'static,
    {
        Self {
            items: Box::new(items),
        }
    }

    /// A cursor over an already-materialized batch.
    pub fn from_documents(documents: Vec<Value>) -> Self {
        Self::new(documents.into_iter().map(Ok))
    }

    /// Drain the cursor into a vector, failing on the first backend error.
    pub fn collect_documents(self) -> Result<Vec<Value>, StoreError> {
        self.collect()
    }
}

impl Iterator for Cursor {
    type Item = Result<Value, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").finish_non_exhaustive()
    }
}

/// Collection-level document operations a storage engine must provide.
pub trait StorageBackend: Send + Sync {
    /// First document matching `filter`, if any.
    fn find_one(&self, collection: &str, filter: &RawDocument)
        -> Result<Option<Value>, StoreError>;

    /// All documents matching `filter`, as a lazy cursor.
    fn find(&self, collection: &str, filter: &RawDocument) -> Result<Cursor, StoreError>;

    /// Store a new document and return its primary key value.
    fn insert(&self, collection: &str, document: RawDocument) -> Result<Value, StoreError>;

    /// Replace documents matching `filter`. Returns the number touched.
    fn update(
        &self,
        collection: &str,
        filter: &RawDocument,
        document: RawDocument,
    ) -> Result<u64, StoreError>;

    /// Remove documents matching `filter`. Returns the number removed.
    fn delete(&self, collection: &str, filter: &RawDocument) -> Result<u64, StoreError>;

    /// Follow a document reference. References always point at `_id`.
    fn dereference(&self, reference: &DocRef) -> Result<Option<Value>, StoreError> {
        let mut filter = RawDocument::new();
        filter.insert("_id".to_string(), reference.id.clone());
        self.find_one(&reference.collection, &filter)
    }
}

/// A storage backend plus the per-model document field cache.
pub struct Connection {
    backend: Arc<dyn StorageBackend>,
    document_fields: RwLock<HashMap<String, Vec<String>, ahash::RandomState>>,
}

impl Connection {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            document_fields: RwLock::new(HashMap::default()),
        }
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Record the declared fields for a model, once. Later registrations of
    /// the same model are ignored.
    pub fn cache_document_fields(&self, schema: &ModelSchema) {
        let mut cache = self.document_fields.write().unwrap();
        if !cache.contains_key(schema.name()) {
            cache.insert(schema.name().to_string(), schema.fields().to_vec());
        }
    }

    /// Declared fields for a model, empty when the model was never seen.
    pub fn document_fields(&self, model: &str) -> Vec<String> {
        self.document_fields
            .read()
            .unwrap()
            .get(model)
            .cloned()
            .unwrap_or_default()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Merge `overlay` into `base`. Nested mappings merge key by key; everything
/// else is overwritten, so later layers win.
pub fn merge_filter(base: &mut RawDocument, overlay: &RawDocument) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_filter(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}
