//! Ordered lists of embedded models.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ModelError;
use crate::model::DocumentModel;
use crate::scenario::Scenario;
use crate::schema::ModelSchema;
use crate::store::Connection;

/// A list-valued sub-document: every entry is a full model of the target
/// schema, kept in document order. The owner's scenario propagates to each
/// entry.
pub struct ArrayModel {
    schema: Arc<ModelSchema>,
    conn: Arc<Connection>,
    scenario: Scenario,
    models: Vec<DocumentModel>,
}

impl ArrayModel {
    pub fn new(
        schema: Arc<ModelSchema>,
        scenario: Scenario,
        conn: Arc<Connection>,
        documents: Vec<Value>,
    ) -> Result<Self, ModelError> {
        let mut list = Self {
            schema,
            conn,
            scenario,
            models: Vec::new(),
        };
        list.populate(documents)?;
        Ok(list)
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// Replace the contents with models built from raw documents. Entries
    /// that are not mappings are dropped.
    pub fn populate(&mut self, documents: Vec<Value>) -> Result<(), ModelError> {
        let mut models = Vec::with_capacity(documents.len());
        for document in documents {
            let fields = match document {
                Value::Object(fields) => fields,
                other => {
                    tracing::trace!(
                        model = self.schema.name(),
                        dropped = %other,
                        "dropping non-mapping entry while populating list"
                    );
                    continue;
                }
            };
            let mut model = DocumentModel::with_connection(
                self.schema.clone(),
                self.scenario.clone(),
                self.conn.clone(),
            );
            for (name, value) in fields {
                model.set(&name, value)?;
            }
            models.push(model);
        }
        self.models = models;
        Ok(())
    }

    pub fn push(&mut self, model: DocumentModel) {
        self.models.push(model);
    }

    pub fn into_models(self) -> Vec<DocumentModel> {
        self.models
    }

    pub fn clear(&mut self) {
        self.models.clear();
    }

    /// Flatten every entry back into a raw document, in order.
    pub fn documents(&mut self) -> Result<Vec<Value>, ModelError> {
        let mut out = Vec::with_capacity(self.models.len());
        for model in &mut self.models {
            out.push(Value::Object(model.get_document(None)?));
        }
        Ok(out)
    }

    pub fn get(&self, index: usize) -> Option<&DocumentModel> {
        self.models.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut DocumentModel> {
        self.models.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentModel> {
        self.models.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DocumentModel> {
        self.models.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl fmt::Debug for ArrayModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayModel")
            .field("schema", &self.schema.name())
            .field("len", &self.models.len())
            .finish()
    }
}
