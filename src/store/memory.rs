//! In-memory storage backend for testing and development.
//! Does NOT persist data.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde_json::Value;

use crate::error::StoreError;

use super::{Cursor, RawDocument, StorageBackend};

/// Collections held as plain vectors of documents, matched by scanning.
///
/// Filters support top-level equality and `$in` membership, which is the
/// query surface relation resolution generates. Generated primary keys are
/// always assigned to `_id`.
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, Vec<Value>>>,
    queries: AtomicU64,
    next_id: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a collection with documents, bypassing id assignment.
    pub fn seed<I>(&self, collection: &str, documents: I)
    where
        I: IntoIterator<Item = Value>,
    {
        let mut collections = self.collections.write().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
    }

    /// Number of read queries served so far (`find`, `find_one` and
    /// dereferences). Lets tests assert that caches short-circuit lookups.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// All documents currently in a collection.
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .read()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn fresh_id(&self) -> Value {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        Value::String(format!("{:024x}", n))
    }

    fn matches(document: &Value, filter: &RawDocument) -> bool {
        let fields = match document.as_object() {
            Some(fields) => fields,
            None => return filter.is_empty(),
        };
        filter.iter().all(|(key, condition)| {
            let actual = fields.get(key).unwrap_or(&Value::Null);
            match condition.as_object().and_then(|c| c.get("$in")) {
                Some(Value::Array(allowed)) => match actual {
                    Value::Array(elements) => elements.iter().any(|e| allowed.contains(e)),
                    scalar => allowed.contains(scalar),
                },
                _ => actual == condition,
            }
        })
    }
}

impl StorageBackend for MemoryBackend {
    fn find_one(
        &self,
        collection: &str,
        filter: &RawDocument,
    ) -> Result<Option<Value>, StoreError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let collections = self.collections.read().unwrap();
        let found = collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| Self::matches(d, filter)).cloned());
        Ok(found)
    }

    fn find(&self, collection: &str, filter: &RawDocument) -> Result<Cursor, StoreError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let collections = self.collections.read().unwrap();
        let matched: Vec<Value> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| Self::matches(d, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Cursor::from_documents(matched))
    }

    fn insert(&self, collection: &str, document: RawDocument) -> Result<Value, StoreError> {
        let mut document = document;
        let id = match document.get("_id") {
            Some(id) if !id.is_null() => id.clone(),
            _ => {
                let id = self.fresh_id();
                document.insert("_id".to_string(), id.clone());
                id
            }
        };
        let mut collections = self.collections.write().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .push(Value::Object(document));
        Ok(id)
    }

    fn update(
        &self,
        collection: &str,
        filter: &RawDocument,
        document: RawDocument,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().unwrap();
        let docs = match collections.get_mut(collection) {
            Some(docs) => docs,
            None => return Ok(0),
        };
        let mut touched = 0;
        for slot in docs.iter_mut() {
            if !Self::matches(slot, filter) {
                continue;
            }
            let mut replacement = document.clone();
            // Replacements keep the stored primary key unless they carry one.
            if !replacement.contains_key("_id") {
                if let Some(id) = slot.get("_id") {
                    replacement.insert("_id".to_string(), id.clone());
                }
            }
            *slot = Value::Object(replacement);
            touched += 1;
        }
        Ok(touched)
    }

    fn delete(&self, collection: &str, filter: &RawDocument) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().unwrap();
        let docs = match collections.get_mut(collection) {
            Some(docs) => docs,
            None => return Ok(0),
        };
        let before = docs.len();
        docs.retain(|d| !Self::matches(d, filter));
        Ok((before - docs.len()) as u64)
    }
}
