//! Model schemas: declared fields, sub-documents, relations, validators and
//! lifecycle hooks.
//!
//! A [`ModelSchema`] is the static description of a model class. Schemas are
//! built once through [`SchemaBuilder`], validated at registration, and held
//! in a process-wide registry so relation targets can be resolved by name.

pub mod validators;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde_json::Value;

use crate::error::ModelError;
use crate::model::events::LifecycleHook;
use crate::scenario::Scenario;
use validators::{Validator, ValidatorKind};

lazy_static! {
    /// Global registry mapping model names to their schemas.
    static ref SCHEMA_REGISTRY: RwLock<HashMap<String, Arc<ModelSchema>, ahash::RandomState>> =
        RwLock::new(HashMap::default());
}

/// Cardinality of an embedded sub-document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubDocumentKind {
    /// One nested model.
    Single,
    /// An ordered list of nested models.
    Multi,
}

/// A declared sub-document slot.
#[derive(Debug, Clone)]
pub struct SubDocumentDecl {
    pub target: String,
    pub kind: SubDocumentKind,
}

/// Cardinality of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    One,
    Many,
}

/// The shape a resolved relation is returned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnShape {
    /// Plain documents, fully materialized.
    Array,
    /// Typed models, fully materialized.
    #[default]
    Model,
    /// A lazy cursor over raw documents (`many` relations only).
    Cursor,
}

/// A declared relation to another registered model.
#[derive(Debug, Clone)]
pub struct RelationDecl {
    pub kind: RelationKind,
    pub target: String,
    /// Field on the target collection to match against. Defaults to the
    /// target's primary key.
    pub foreign_key: Option<String>,
    /// Attribute on this model holding the join value. Defaults to this
    /// model's primary key.
    pub local_key: Option<String>,
    /// Extra criteria merged into every lookup for this relation.
    pub filter: Option<Value>,
    pub shape: ReturnShape,
}

impl RelationDecl {
    pub fn one(target: &str) -> Self {
        Self::new(RelationKind::One, target)
    }

    pub fn many(target: &str) -> Self {
        Self::new(RelationKind::Many, target)
    }

    fn new(kind: RelationKind, target: &str) -> Self {
        Self {
            kind,
            target: target.to_string(),
            foreign_key: None,
            local_key: None,
            filter: None,
            shape: ReturnShape::default(),
        }
    }

    pub fn foreign_key(mut self, field: &str) -> Self {
        self.foreign_key = Some(field.to_string());
        self
    }

    pub fn local_key(mut self, attribute: &str) -> Self {
        self.local_key = Some(attribute.to_string());
        self
    }

    pub fn filter(mut self, criteria: Value) -> Self {
        self.filter = Some(criteria);
        self
    }

    pub fn shape(mut self, shape: ReturnShape) -> Self {
        self.shape = shape;
        self
    }
}

/// Static description of a model class.
pub struct ModelSchema {
    name: String,
    collection: String,
    primary_key: String,
    fields: Vec<String>,
    sub_documents: IndexMap<String, SubDocumentDecl>,
    relations: IndexMap<String, RelationDecl>,
    validators: Vec<Arc<dyn Validator>>,
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl ModelSchema {
    pub fn builder(name: &str) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Look up a registered schema, failing with `UnknownModel` when absent.
    pub fn lookup(name: &str) -> Result<Arc<Self>, ModelError> {
        Self::try_lookup(name).ok_or_else(|| ModelError::unknown_model(name))
    }

    pub fn try_lookup(name: &str) -> Option<Arc<Self>> {
        SCHEMA_REGISTRY.read().unwrap().get(name).cloned()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Fields known to belong to the collection, in declaration order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn sub_documents(&self) -> &IndexMap<String, SubDocumentDecl> {
        &self.sub_documents
    }

    pub fn relations(&self) -> &IndexMap<String, RelationDecl> {
        &self.relations
    }

    pub fn hooks(&self) -> &[Arc<dyn LifecycleHook>] {
        &self.hooks
    }

    /// Validators covering `attribute` that are active in `scenario`.
    pub fn validators_for(&self, attribute: &str, scenario: &Scenario) -> Vec<Arc<dyn Validator>> {
        self.validators
            .iter()
            .filter(|v| v.applies_to(scenario))
            .filter(|v| v.attributes().iter().any(|a| a == attribute))
            .cloned()
            .collect()
    }

    /// All validators active in `scenario`.
    pub fn validators_for_scenario(&self, scenario: &Scenario) -> Vec<Arc<dyn Validator>> {
        self.validators
            .iter()
            .filter(|v| v.applies_to(scenario))
            .cloned()
            .collect()
    }

    /// Whether any active validator marks `attribute` as required.
    pub fn is_field_required(&self, attribute: &str, scenario: &Scenario) -> bool {
        self.validators_for(attribute, scenario)
            .iter()
            .any(|v| v.kind() == ValidatorKind::Required)
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("primary_key", &self.primary_key)
            .field("fields", &self.fields)
            .field("sub_documents", &self.sub_documents.keys().collect::<Vec<_>>())
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .field("validators", &self.validators.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Builder for [`ModelSchema`]. Declarations are checked once when the schema
/// is built, so access paths never re-validate them.
pub struct SchemaBuilder {
    name: String,
    collection: Option<String>,
    primary_key: String,
    fields: Vec<String>,
    sub_documents: IndexMap<String, SubDocumentDecl>,
    relations: IndexMap<String, RelationDecl>,
    validators: Vec<Arc<dyn Validator>>,
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl SchemaBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            collection: None,
            primary_key: "_id".to_string(),
            fields: Vec::new(),
            sub_documents: IndexMap::new(),
            relations: IndexMap::new(),
            validators: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Override the collection name derived from the model name.
    pub fn collection(mut self, name: &str) -> Self {
        self.collection = Some(name.to_string());
        self
    }

    pub fn primary_key(mut self, field: &str) -> Self {
        self.primary_key = field.to_string();
        self
    }

    pub fn field(mut self, name: &str) -> Self {
        self.fields.push(name.to_string());
        self
    }

    pub fn fields<'a, I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.fields.extend(names.into_iter().map(String::from));
        self
    }

    /// Declare a single embedded sub-document.
    pub fn embeds_one(mut self, name: &str, target: &str) -> Self {
        self.sub_documents.insert(
            name.to_string(),
            SubDocumentDecl {
                target: target.to_string(),
                kind: SubDocumentKind::Single,
            },
        );
        self
    }

    /// Declare an embedded list of sub-documents.
    pub fn embeds_many(mut self, name: &str, target: &str) -> Self {
        self.sub_documents.insert(
            name.to_string(),
            SubDocumentDecl {
                target: target.to_string(),
                kind: SubDocumentKind::Multi,
            },
        );
        self
    }

    pub fn relation(mut self, name: &str, decl: RelationDecl) -> Self {
        self.relations.insert(name.to_string(), decl);
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn hook(mut self, hook: impl LifecycleHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Validate the declarations and produce the schema without registering it.
    pub fn build(self) -> Result<ModelSchema, ModelError> {
        if self.name.is_empty() {
            return Err(ModelError::invalid_declaration(
                "(unnamed)",
                "name",
                "model name cannot be empty",
            ));
        }
        if self.primary_key.is_empty() {
            return Err(ModelError::invalid_declaration(
                &self.name,
                "_id",
                "primary key cannot be empty",
            ));
        }
        for (name, decl) in &self.sub_documents {
            if name.is_empty() || decl.target.is_empty() {
                return Err(ModelError::invalid_declaration(
                    &self.name,
                    name.as_str(),
                    "sub-document declarations need a name and a target model",
                ));
            }
        }
        for (name, decl) in &self.relations {
            if name.is_empty() || decl.target.is_empty() {
                return Err(ModelError::invalid_declaration(
                    &self.name,
                    name.as_str(),
                    "relation declarations need a name and a target model",
                ));
            }
            if decl.foreign_key.as_deref() == Some("") || decl.local_key.as_deref() == Some("") {
                return Err(ModelError::invalid_declaration(
                    &self.name,
                    name.as_str(),
                    "join keys cannot be empty strings",
                ));
            }
            if decl.shape == ReturnShape::Cursor && decl.kind == RelationKind::One {
                return Err(ModelError::invalid_declaration(
                    &self.name,
                    name.as_str(),
                    "cursor shape only applies to many relations",
                ));
            }
        }

        let collection = self
            .collection
            .unwrap_or_else(|| collection_for(&self.name));
        Ok(ModelSchema {
            name: self.name,
            collection,
            primary_key: self.primary_key,
            fields: self.fields,
            sub_documents: self.sub_documents,
            relations: self.relations,
            validators: self.validators,
            hooks: self.hooks,
        })
    }

    /// Build the schema and publish it in the global registry. Registering a
    /// name twice replaces the previous schema.
    pub fn register(self) -> Result<Arc<ModelSchema>, ModelError> {
        let schema = Arc::new(self.build()?);
        SCHEMA_REGISTRY
            .write()
            .unwrap()
            .insert(schema.name.clone(), schema.clone());
        Ok(schema)
    }
}

/// Derive a collection name from a model name.
pub fn collection_for(name: &str) -> String {
    // Strip a Model suffix if present
    let name = name.strip_suffix("Model").unwrap_or(name);

    let mut result = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            result.push('_');
        }
        result.extend(c.to_lowercase());
    }
    result.push('s'); // simple pluralization
    result
}
