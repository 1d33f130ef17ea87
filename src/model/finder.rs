//! Per-model finders.
//!
//! A [`Finder`] pairs a schema with a connection and turns stored documents
//! into typed models. Find events fire around lookups: `before_find` on a
//! transient prototype before the query, `after_find` on every populated
//! model.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ModelError;
use crate::model::events::LifecycleEvent;
use crate::model::DocumentModel;
use crate::scenario::Scenario;
use crate::schema::ModelSchema;
use crate::store::{global_connection, Connection, Cursor, RawDocument};

pub struct Finder {
    schema: Arc<ModelSchema>,
    conn: Arc<Connection>,
}

impl Finder {
    pub fn new(schema: Arc<ModelSchema>, conn: Arc<Connection>) -> Self {
        Self { schema, conn }
    }

    /// Finder for a registered model, using the process-wide connection.
    pub fn for_model(name: &str) -> Result<Self, ModelError> {
        Ok(Self::new(ModelSchema::lookup(name)?, global_connection()?))
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// First matching document as a typed model.
    pub fn find_one(&self, filter: &RawDocument) -> Result<Option<DocumentModel>, ModelError> {
        self.fire_before_find()?;
        match self
            .conn
            .backend()
            .find_one(self.schema.collection(), filter)?
        {
            Some(document) => Ok(Some(self.populate_record(document)?)),
            None => Ok(None),
        }
    }

    /// Matching documents as a lazy cursor of raw documents.
    pub fn find(&self, filter: &RawDocument) -> Result<Cursor, ModelError> {
        self.fire_before_find()?;
        Ok(self.conn.backend().find(self.schema.collection(), filter)?)
    }

    /// Matching documents, each populated into a typed model.
    pub fn find_all(&self, filter: &RawDocument) -> Result<Vec<DocumentModel>, ModelError> {
        let mut models = Vec::new();
        for document in self.find(filter)? {
            models.push(self.populate_record(document?)?);
        }
        Ok(models)
    }

    /// Look up one document by primary key.
    pub fn find_by_pk(&self, id: Value) -> Result<Option<DocumentModel>, ModelError> {
        let mut filter = RawDocument::new();
        filter.insert(self.schema.primary_key().to_string(), id);
        self.find_one(&filter)
    }

    /// Build a typed model from a raw stored document and fire `after_find`
    /// on it.
    pub fn populate_record(&self, document: Value) -> Result<DocumentModel, ModelError> {
        let mut model = DocumentModel::from_document_with_connection(
            self.schema.clone(),
            self.conn.clone(),
            document,
        )?;
        model.after_find()?;
        Ok(model)
    }

    /// `before_find` observes queries, it cannot cancel them. It fires on a
    /// transient prototype since no model instance exists yet.
    fn fire_before_find(&self) -> Result<(), ModelError> {
        if self
            .schema
            .hooks()
            .iter()
            .any(|h| h.handles(LifecycleEvent::BeforeFind))
        {
            let mut prototype = DocumentModel::with_connection(
                self.schema.clone(),
                Scenario::Search,
                self.conn.clone(),
            );
            prototype.before_find()?;
        }
        Ok(())
    }
}

impl fmt::Debug for Finder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finder")
            .field("schema", &self.schema.name())
            .finish()
    }
}
