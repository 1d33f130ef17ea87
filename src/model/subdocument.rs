//! Embedded sub-documents.
//!
//! Declared sub-document slots materialize lazily: the first read, write or
//! lifecycle sweep that touches a slot builds the typed model (or model
//! list) and caches it on the owner. Writes always reuse the cached
//! instance, so views bound to it observe updates.

use serde_json::Value;

use crate::error::ModelError;
use crate::model::{value_type_name, ArrayModel, Assign, DocumentModel};
use crate::schema::{ModelSchema, SubDocumentKind};

/// A materialized sub-document slot.
#[derive(Debug)]
pub enum SubDocument {
    Single(DocumentModel),
    Multi(ArrayModel),
}

impl SubDocument {
    pub fn kind(&self) -> SubDocumentKind {
        match self {
            SubDocument::Single(_) => SubDocumentKind::Single,
            SubDocument::Multi(_) => SubDocumentKind::Multi,
        }
    }

    pub fn as_single(&self) -> Option<&DocumentModel> {
        match self {
            SubDocument::Single(model) => Some(model),
            SubDocument::Multi(_) => None,
        }
    }

    pub fn as_single_mut(&mut self) -> Option<&mut DocumentModel> {
        match self {
            SubDocument::Single(model) => Some(model),
            SubDocument::Multi(_) => None,
        }
    }

    pub fn as_multi(&self) -> Option<&ArrayModel> {
        match self {
            SubDocument::Single(_) => None,
            SubDocument::Multi(models) => Some(models),
        }
    }

    pub fn as_multi_mut(&mut self) -> Option<&mut ArrayModel> {
        match self {
            SubDocument::Single(_) => None,
            SubDocument::Multi(models) => Some(models),
        }
    }

    /// Flatten the slot back to its raw form: a mapping for single slots, a
    /// list of mappings for multi slots.
    pub fn to_document(&mut self) -> Result<Value, ModelError> {
        Ok(match self {
            SubDocument::Single(model) => Value::Object(model.get_document(None)?),
            SubDocument::Multi(models) => Value::Array(models.documents()?),
        })
    }
}

impl DocumentModel {
    /// Materialize the declared sub-document `name` if it never was, and
    /// return the cached slot.
    pub fn resolve_sub_document(&mut self, name: &str) -> Result<&SubDocument, ModelError> {
        if !self.sub_documents.contains_key(name) {
            let slot = self.instantiate_sub_document(name, Value::Null)?;
            self.sub_documents.insert(name.to_string(), slot);
        }
        Ok(&self.sub_documents[name])
    }

    /// Like [`resolve_sub_document`](Self::resolve_sub_document) but hands
    /// out the slot mutably.
    pub fn sub_document_mut(&mut self, name: &str) -> Result<&mut SubDocument, ModelError> {
        self.resolve_sub_document(name)?;
        match self.sub_documents.get_mut(name) {
            Some(slot) => Ok(slot),
            None => Err(ModelError::unknown_sub_document(self.schema.name(), name)),
        }
    }

    /// Build a fresh slot for `name` from an optional initial raw value.
    fn instantiate_sub_document(
        &self,
        name: &str,
        initial: Value,
    ) -> Result<SubDocument, ModelError> {
        let decl = self
            .schema
            .sub_documents()
            .get(name)
            .ok_or_else(|| ModelError::unknown_sub_document(self.schema.name(), name))?;
        let target = ModelSchema::lookup(&decl.target)?;
        tracing::trace!(
            model = self.schema.name(),
            name,
            target = target.name(),
            "materializing sub-document"
        );
        Ok(match decl.kind {
            SubDocumentKind::Single => {
                let mut model = DocumentModel::with_connection(
                    target,
                    self.scenario.clone(),
                    self.conn.clone(),
                );
                if let Value::Object(fields) = initial {
                    for (field, value) in fields {
                        model.set(&field, value)?;
                    }
                }
                SubDocument::Single(model)
            }
            SubDocumentKind::Multi => {
                let documents = match initial {
                    Value::Array(items) => items,
                    Value::Object(entries) => entries.into_iter().map(|(_, v)| v).collect(),
                    _ => Vec::new(),
                };
                SubDocument::Multi(ArrayModel::new(
                    target,
                    self.scenario.clone(),
                    self.conn.clone(),
                    documents,
                )?)
            }
        })
    }

    /// Assign into the declared sub-document `name`.
    ///
    /// Accepts `null` (clears: a single slot gets all its known attributes
    /// nulled in place, a multi slot empties), a raw mapping or list
    /// (repopulates the cached instance), or an already-typed value
    /// (replaces the slot). Anything else is an `InvalidSubDocumentValue`.
    pub fn set_sub_document(
        &mut self,
        name: &str,
        value: impl Into<Assign>,
    ) -> Result<(), ModelError> {
        if !self.sub_documents.contains_key(name)
            && !self.schema.sub_documents().contains_key(name)
        {
            return Err(ModelError::unknown_sub_document(self.schema.name(), name));
        }

        match value.into() {
            Assign::Single(model) => {
                self.sub_documents
                    .insert(name.to_string(), SubDocument::Single(model));
            }
            Assign::Multi(models) => {
                self.sub_documents
                    .insert(name.to_string(), SubDocument::Multi(models));
            }
            Assign::Value(Value::Null) => {
                self.resolve_sub_document(name)?;
                if let Some(slot) = self.sub_documents.get_mut(name) {
                    match slot {
                        SubDocument::Single(model) => {
                            let known: Vec<String> = model.attribute_names();
                            for field in known {
                                model.set(&field, Value::Null)?;
                            }
                        }
                        SubDocument::Multi(models) => models.clear(),
                    }
                }
            }
            Assign::Value(Value::Object(entries)) => {
                self.resolve_sub_document(name)?;
                if let Some(slot) = self.sub_documents.get_mut(name) {
                    match slot {
                        SubDocument::Single(model) => {
                            for (field, value) in entries {
                                model.set(&field, value)?;
                            }
                        }
                        SubDocument::Multi(models) => {
                            models.populate(entries.into_iter().map(|(_, v)| v).collect())?;
                        }
                    }
                }
            }
            Assign::Value(Value::Array(items)) => {
                self.resolve_sub_document(name)?;
                if let Some(slot) = self.sub_documents.get_mut(name) {
                    match slot {
                        SubDocument::Single(_) => {
                            return Err(ModelError::invalid_sub_document_value(name, "list"));
                        }
                        SubDocument::Multi(models) => models.populate(items)?,
                    }
                }
            }
            Assign::Value(other) => {
                return Err(ModelError::invalid_sub_document_value(
                    name,
                    value_type_name(&other),
                ));
            }
            Assign::Related(_) => {
                return Err(ModelError::invalid_sub_document_value(name, "relation value"));
            }
        }
        Ok(())
    }
}
