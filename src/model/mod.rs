//! Document models.
//!
//! A [`DocumentModel`] is a typed view over one stored document. Values live
//! in three layered stores: plain attributes, embedded sub-documents and
//! lazily-resolved relations. Reads and writes go through one dynamic
//! protocol ([`DocumentModel::get`] / [`DocumentModel::set`]) that picks the
//! store by declaration:
//!
//! - read priority: non-null attribute, cached sub-document, declared
//!   sub-document (resolved and cached), cached relation, declared relation
//!   (resolved and cached), null;
//! - write priority: declared or cached sub-document first, then relation
//!   cache, then the plain attribute store. A name declared both as
//!   sub-document and relation goes to the sub-document; the relation cache
//!   is left alone.
//!
//! Models flatten back to raw documents with
//! [`get_document`](DocumentModel::get_document), which is the canonical
//! form handed to storage.

pub mod array;
pub mod attributes;
pub mod events;
pub mod finder;
pub mod path;
pub mod relation;
pub mod subdocument;

mod tests;

pub use array::ArrayModel;
pub use attributes::AttributeStore;
pub use events::{FnHook, HookOutcome, LifecycleEvent, LifecycleHook};
pub use finder::Finder;
pub use relation::Related;
pub use subdocument::SubDocument;

use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::error::{ModelError, StoreError};
use crate::scenario::Scenario;
use crate::schema::validators::{run_validators, ValidationError};
use crate::schema::ModelSchema;
use crate::store::{global_connection, Connection, RawDocument};

// ============================================================================
// Dynamic Attribute Protocol Types
// ============================================================================

/// A value read through the dynamic attribute protocol.
#[derive(Debug)]
pub enum Attr<'a> {
    /// A plain attribute value (never null; null attributes read as `Null`).
    Value(&'a Value),
    /// A single embedded model.
    Single(&'a DocumentModel),
    /// An embedded model list.
    Multi(&'a ArrayModel),
    /// A resolved (or assigned) relation value.
    Related(&'a Related),
    /// Nothing holds this name.
    Null,
}

impl<'a> Attr<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, Attr::Null)
    }

    pub fn as_value(&self) -> Option<&'a Value> {
        match self {
            Attr::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_single(&self) -> Option<&'a DocumentModel> {
        match self {
            Attr::Single(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_multi(&self) -> Option<&'a ArrayModel> {
        match self {
            Attr::Multi(models) => Some(models),
            _ => None,
        }
    }

    pub fn as_related(&self) -> Option<&'a Related> {
        match self {
            Attr::Related(related) => Some(related),
            _ => None,
        }
    }
}

/// A value written through the dynamic attribute protocol.
#[derive(Debug)]
pub enum Assign {
    Value(Value),
    Single(DocumentModel),
    Multi(ArrayModel),
    Related(Related),
}

impl From<Value> for Assign {
    fn from(value: Value) -> Self {
        Assign::Value(value)
    }
}

impl From<DocumentModel> for Assign {
    fn from(model: DocumentModel) -> Self {
        Assign::Single(model)
    }
}

impl From<ArrayModel> for Assign {
    fn from(models: ArrayModel) -> Self {
        Assign::Multi(models)
    }
}

impl From<Related> for Assign {
    fn from(related: Related) -> Self {
        Assign::Related(related)
    }
}

impl From<&str> for Assign {
    fn from(value: &str) -> Self {
        Assign::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Assign {
    fn from(value: String) -> Self {
        Assign::Value(Value::String(value))
    }
}

impl From<i64> for Assign {
    fn from(value: i64) -> Self {
        Assign::Value(Value::from(value))
    }
}

impl From<f64> for Assign {
    fn from(value: f64) -> Self {
        Assign::Value(Value::from(value))
    }
}

impl From<bool> for Assign {
    fn from(value: bool) -> Self {
        Assign::Value(Value::Bool(value))
    }
}

pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Flatten a typed assignment into a raw value for the plain store.
fn flatten_assign(value: Assign) -> Result<Value, ModelError> {
    Ok(match value {
        Assign::Value(value) => value,
        Assign::Single(mut model) => Value::Object(model.get_document(None)?),
        Assign::Multi(mut models) => Value::Array(models.documents()?),
        Assign::Related(mut related) => related.to_document()?,
    })
}

// ============================================================================
// DocumentModel
// ============================================================================

/// A typed view over one stored document.
pub struct DocumentModel {
    pub(crate) schema: Arc<ModelSchema>,
    pub(crate) conn: Arc<Connection>,
    pub(crate) scenario: Scenario,
    pub(crate) attributes: AttributeStore,
    pub(crate) sub_documents: IndexMap<String, SubDocument>,
    pub(crate) related: IndexMap<String, Related>,
    pub(crate) hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl DocumentModel {
    /// New empty model on the process-wide connection.
    pub fn new(schema: Arc<ModelSchema>, scenario: Scenario) -> Result<Self, ModelError> {
        Ok(Self::with_connection(schema, scenario, global_connection()?))
    }

    /// New empty model on an explicit connection.
    pub fn with_connection(
        schema: Arc<ModelSchema>,
        scenario: Scenario,
        conn: Arc<Connection>,
    ) -> Self {
        conn.cache_document_fields(&schema);
        let hooks = schema.hooks().to_vec();
        Self {
            schema,
            conn,
            scenario,
            attributes: AttributeStore::new(),
            sub_documents: IndexMap::new(),
            related: IndexMap::new(),
            hooks,
        }
    }

    /// Populate a model from a stored document, on the process-wide
    /// connection. The model comes back in [`Scenario::Update`].
    pub fn from_document(schema: Arc<ModelSchema>, document: Value) -> Result<Self, ModelError> {
        Self::from_document_with_connection(schema, global_connection()?, document)
    }

    /// Populate a model from a stored document on an explicit connection.
    /// Every stored key is written through the dynamic protocol, so declared
    /// sub-documents materialize as typed models.
    pub fn from_document_with_connection(
        schema: Arc<ModelSchema>,
        conn: Arc<Connection>,
        document: Value,
    ) -> Result<Self, ModelError> {
        let fields = match document {
            Value::Object(fields) => fields,
            other => {
                return Err(StoreError::malformed_document(format!(
                    "expected a mapping, got {}",
                    value_type_name(&other)
                ))
                .into());
            }
        };
        let mut model = Self::with_connection(schema, Scenario::Update, conn);
        for (name, value) in fields {
            model.set(&name, value)?;
        }
        Ok(model)
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.scenario = scenario;
    }

    /// The plain attribute store. Typed layers are reached through
    /// [`get`](Self::get) or the dedicated accessors.
    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// Attach an instance-level hook on top of the schema's hooks.
    pub fn attach_hook(&mut self, hook: impl LifecycleHook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    // ------------------------------------------------------------------
    // Dynamic attribute protocol
    // ------------------------------------------------------------------

    /// Read `name` through the layered stores.
    ///
    /// A null plain attribute does not count as present, so a declared
    /// sub-document or relation under the same name still resolves. Unknown
    /// names read as [`Attr::Null`]; reads only fail when lazy resolution
    /// fails.
    pub fn get(&mut self, name: &str) -> Result<Attr<'_>, ModelError> {
        if self.attributes.is_set(name) {
            return Ok(match self.attributes.get(name) {
                Some(value) => Attr::Value(value),
                None => Attr::Null,
            });
        }
        if self.sub_documents.contains_key(name) {
            return Ok(self.cached_sub_document_attr(name));
        }
        if self.schema.sub_documents().contains_key(name) {
            self.resolve_sub_document(name)?;
            return Ok(self.cached_sub_document_attr(name));
        }
        if self.related.contains_key(name) {
            return Ok(self.cached_related_attr(name));
        }
        if self.schema.relations().contains_key(name) {
            self.get_related(name, false, None)?;
            return Ok(self.cached_related_attr(name));
        }
        Ok(Attr::Null)
    }

    fn cached_sub_document_attr(&self, name: &str) -> Attr<'_> {
        match self.sub_documents.get(name) {
            Some(SubDocument::Single(model)) => Attr::Single(model),
            Some(SubDocument::Multi(models)) => Attr::Multi(models),
            None => Attr::Null,
        }
    }

    fn cached_related_attr(&self, name: &str) -> Attr<'_> {
        match self.related.get(name) {
            Some(related) => Attr::Related(related),
            None => Attr::Null,
        }
    }

    /// Write `name` through the layered stores.
    ///
    /// Declared or cached sub-documents win; a name that is also a relation
    /// leaves the relation cache untouched. Undeclared names land in the
    /// plain store, with typed values flattened to raw documents first.
    pub fn set(&mut self, name: &str, value: impl Into<Assign>) -> Result<(), ModelError> {
        let value = value.into();
        if self.sub_documents.contains_key(name)
            || self.schema.sub_documents().contains_key(name)
        {
            return self.set_sub_document(name, value);
        }
        if self.related.contains_key(name) || self.schema.relations().contains_key(name) {
            self.write_related(name, value);
            return Ok(());
        }
        let raw = flatten_assign(value)?;
        self.attributes.set(name, raw);
        Ok(())
    }

    /// Truthiness of `name`, mirroring the read priority. Declared
    /// sub-documents always count as set; a relation counts only when it
    /// resolves non-null, which may trigger resolution.
    pub fn is_attribute_set(&mut self, name: &str) -> Result<bool, ModelError> {
        if self.attributes.is_set(name) {
            return Ok(true);
        }
        if self.sub_documents.contains_key(name)
            || self.schema.sub_documents().contains_key(name)
        {
            return Ok(true);
        }
        if let Some(cached) = self.related.get(name) {
            if !cached.is_null() {
                return Ok(true);
            }
        }
        if self.schema.relations().contains_key(name) {
            let related = self.get_related(name, false, None)?;
            return Ok(!related.is_null());
        }
        Ok(false)
    }

    /// Remove `name` from whichever store currently holds it: a non-null
    /// plain attribute first, then the sub-document cache, then the relation
    /// cache, then a leftover null attribute entry.
    pub fn unset(&mut self, name: &str) {
        if self.attributes.is_set(name) {
            self.attributes.unset(name);
        } else if self.sub_documents.contains_key(name) {
            self.sub_documents.shift_remove(name);
        } else if self.related.contains_key(name) {
            self.related.shift_remove(name);
        } else {
            self.attributes.unset(name);
        }
    }

    // ------------------------------------------------------------------
    // Document assembly
    // ------------------------------------------------------------------

    /// Every attribute name this model answers to: the fields cached for the
    /// schema, dynamically-set attributes, and declared sub-document slots.
    /// Relations are not attributes.
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: IndexSet<String> = IndexSet::new();
        names.extend(self.conn.document_fields(self.schema.name()));
        names.extend(self.attributes.names().map(String::from));
        names.extend(self.schema.sub_documents().keys().cloned());
        names.into_iter().collect()
    }

    /// Whether `name` is among [`attribute_names`](Self::attribute_names).
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_names().iter().any(|n| n == name)
    }

    /// Flatten the model into a raw document over the requested fields (all
    /// attribute names when `fields` is empty or absent). Sub-documents
    /// flatten recursively; names nothing holds come out null. This is the
    /// canonical form for persistence.
    pub fn get_document(&mut self, fields: Option<&[String]>) -> Result<RawDocument, ModelError> {
        let names: Vec<String> = match fields {
            Some(requested) if !requested.is_empty() => requested.to_vec(),
            _ => self.attribute_names(),
        };
        let mut document = RawDocument::new();
        for name in names {
            let value = self.read_for_document(&name)?;
            document.insert(name, value);
        }
        Ok(document)
    }

    /// [`get_document`](Self::get_document) serialized to a JSON string.
    pub fn get_json_document(&mut self) -> Result<String, ModelError> {
        let document = self.get_document(None)?;
        serde_json::to_string(&document)
            .map_err(|e| StoreError::malformed_document(e.to_string()).into())
    }

    fn read_for_document(&mut self, name: &str) -> Result<Value, ModelError> {
        if self.attributes.is_set(name) {
            return Ok(self.attributes.get(name).cloned().unwrap_or(Value::Null));
        }
        if !self.sub_documents.contains_key(name) && self.schema.sub_documents().contains_key(name)
        {
            self.resolve_sub_document(name)?;
        }
        if let Some(slot) = self.sub_documents.get_mut(name) {
            return slot.to_document();
        }
        if !self.related.contains_key(name) && self.schema.relations().contains_key(name) {
            self.get_related(name, false, None)?;
        }
        if let Some(cached) = self.related.get_mut(name) {
            return cached.to_document();
        }
        Ok(Value::Null)
    }

    /// Drop the relation cache and null out every known attribute. Nulling a
    /// declared sub-document clears it in place, so slots survive cleaning.
    pub fn clean(&mut self) -> Result<(), ModelError> {
        self.related.clear();
        for name in self.attribute_names() {
            self.set(&name, Value::Null)?;
        }
        Ok(())
    }

    /// Run every validator active in the current scenario.
    pub fn validate(&mut self) -> Vec<ValidationError> {
        run_validators(self)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Persist the model: update when a primary key value is present, insert
    /// otherwise (the assigned key lands back in the attributes). Returns
    /// `false` when a `before_save` hook cancelled the save.
    pub fn save(&mut self) -> Result<bool, ModelError> {
        if !self.before_save()? {
            tracing::debug!(
                model = self.schema.name(),
                "save cancelled by before_save hook"
            );
            return Ok(false);
        }

        let primary_key = self.schema.primary_key().to_string();
        let mut document = self.get_document(None)?;
        let existing = document
            .get(&primary_key)
            .filter(|id| !id.is_null())
            .cloned();
        tracing::debug!(
            model = self.schema.name(),
            collection = self.schema.collection(),
            update = existing.is_some(),
            "saving document"
        );
        match existing {
            Some(id) => {
                let mut filter = RawDocument::new();
                filter.insert(primary_key, id);
                self.conn
                    .backend()
                    .update(self.schema.collection(), &filter, document)?;
            }
            None => {
                document.remove(&primary_key);
                let id = self
                    .conn
                    .backend()
                    .insert(self.schema.collection(), document)?;
                self.attributes.set(&primary_key, id);
            }
        }
        self.after_save()?;
        Ok(true)
    }

    /// Remove the stored document this model maps. Fails without a primary
    /// key value; returns `false` when a `before_delete` hook cancelled.
    pub fn delete(&mut self) -> Result<bool, ModelError> {
        if !self.before_delete()? {
            tracing::debug!(
                model = self.schema.name(),
                "delete cancelled by before_delete hook"
            );
            return Ok(false);
        }

        let primary_key = self.schema.primary_key().to_string();
        let id = match self.attributes.get(&primary_key) {
            Some(id) if !id.is_null() => id.clone(),
            _ => return Err(ModelError::missing_primary_key(self.schema.name())),
        };
        let mut filter = RawDocument::new();
        filter.insert(primary_key, id);
        self.conn
            .backend()
            .delete(self.schema.collection(), &filter)?;
        self.after_delete()?;
        Ok(true)
    }
}

impl fmt::Debug for DocumentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentModel")
            .field("schema", &self.schema.name())
            .field("scenario", &self.scenario)
            .field("attributes", &self.attributes)
            .field("sub_documents", &self.sub_documents)
            .field("related", &self.related)
            .finish_non_exhaustive()
    }
}
