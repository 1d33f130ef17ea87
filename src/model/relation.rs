//! Lazy relation resolution.
//!
//! Relations resolve on first read and the result is cached on the owner,
//! null results included, so repeated reads never re-query. A refresh or a
//! caller-supplied criteria mapping forces a new lookup (and replaces the
//! cache). The stored join value decides the query: references dereference
//! directly, lists become `$in` clauses, everything else matches the foreign
//! key by equality.

use std::fmt;

use serde_json::Value;

use crate::error::ModelError;
use crate::model::{Assign, Attr, DocumentModel, Finder};
use crate::schema::{ModelSchema, RelationDecl, RelationKind, ReturnShape};
use crate::store::{merge_filter, Cursor, JoinKey, RawDocument};

/// A resolved relation value.
#[derive(Debug)]
pub enum Related {
    /// Nothing matched (or null was assigned).
    Null,
    /// A single typed model.
    Model(DocumentModel),
    /// A list of typed models.
    Models(Vec<DocumentModel>),
    /// A single plain document (`one` relation shaped as array).
    Document(RawDocument),
    /// Plain documents, fully materialized.
    Documents(Vec<Value>),
    /// A lazy cursor over raw documents.
    Cursor(Cursor),
    /// A raw value assigned straight into the slot.
    Raw(Value),
}

impl Related {
    pub fn is_null(&self) -> bool {
        matches!(self, Related::Null)
    }

    pub fn as_model(&self) -> Option<&DocumentModel> {
        match self {
            Related::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_model_mut(&mut self) -> Option<&mut DocumentModel> {
        match self {
            Related::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_models(&self) -> Option<&[DocumentModel]> {
        match self {
            Related::Models(models) => Some(models),
            _ => None,
        }
    }

    pub fn as_models_mut(&mut self) -> Option<&mut Vec<DocumentModel>> {
        match self {
            Related::Models(models) => Some(models),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&RawDocument> {
        match self {
            Related::Document(document) => Some(document),
            _ => None,
        }
    }

    pub fn as_documents(&self) -> Option<&[Value]> {
        match self {
            Related::Documents(documents) => Some(documents),
            _ => None,
        }
    }

    pub fn into_cursor(self) -> Option<Cursor> {
        match self {
            Related::Cursor(cursor) => Some(cursor),
            _ => None,
        }
    }

    /// Flatten for document assembly. Cursors cannot flatten without being
    /// drained, so they collapse to null.
    pub fn to_document(&mut self) -> Result<Value, ModelError> {
        Ok(match self {
            Related::Null => Value::Null,
            Related::Model(model) => Value::Object(model.get_document(None)?),
            Related::Models(models) => {
                let mut out = Vec::with_capacity(models.len());
                for model in models {
                    out.push(Value::Object(model.get_document(None)?));
                }
                Value::Array(out)
            }
            Related::Document(document) => Value::Object(document.clone()),
            Related::Documents(documents) => Value::Array(documents.clone()),
            Related::Cursor(_) => Value::Null,
            Related::Raw(value) => value.clone(),
        })
    }
}

impl fmt::Display for Related {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Related::Null => "null",
            Related::Model(_) => "model",
            Related::Models(_) => "models",
            Related::Document(_) => "document",
            Related::Documents(_) => "documents",
            Related::Cursor(_) => "cursor",
            Related::Raw(_) => "raw",
        };
        f.write_str(label)
    }
}

impl DocumentModel {
    /// Resolve relation `name` through the cache.
    pub fn related(&mut self, name: &str) -> Result<&Related, ModelError> {
        self.get_related(name, false, None)
    }

    /// Resolve relation `name`. The cache serves the result unless `refresh`
    /// is set or `criteria` carries extra conditions; either way the fresh
    /// result replaces the cache.
    pub fn get_related(
        &mut self,
        name: &str,
        refresh: bool,
        criteria: Option<&RawDocument>,
    ) -> Result<&Related, ModelError> {
        let forced = criteria.map_or(false, |c| !c.is_empty());
        if self.related.contains_key(name) && !refresh && !forced {
            return Ok(&self.related[name]);
        }

        let decl = match self.schema.relations().get(name) {
            Some(decl) => decl.clone(),
            None => return Err(ModelError::unknown_relation(self.schema.name(), name)),
        };
        tracing::debug!(
            model = self.schema.name(),
            relation = name,
            refresh,
            "lazily loading relation"
        );

        let target = ModelSchema::lookup(&decl.target)?;
        let finder = Finder::new(target.clone(), self.conn.clone());

        // The stored join value, read through the full resolution chain.
        let local_key = decl
            .local_key
            .clone()
            .unwrap_or_else(|| self.schema.primary_key().to_string());
        let join_value = match self.get(&local_key)? {
            Attr::Value(value) => value.clone(),
            _ => Value::Null,
        };

        let foreign_key = decl
            .foreign_key
            .clone()
            .unwrap_or_else(|| target.primary_key().to_string());

        let related = match JoinKey::classify(join_value) {
            JoinKey::Reference(reference) => match self.conn.backend().dereference(&reference)? {
                Some(document) => Related::Model(finder.populate_record(document)?),
                None => Related::Null,
            },
            JoinKey::ReferenceList(references) => {
                let mut models = Vec::with_capacity(references.len());
                for reference in references {
                    // References that no longer resolve drop out silently.
                    if let Some(document) = self.conn.backend().dereference(&reference)? {
                        models.push(finder.populate_record(document)?);
                    }
                }
                Related::Models(models)
            }
            JoinKey::Keys(values) => {
                let mut term = RawDocument::new();
                term.insert("$in".to_string(), Value::Array(values));
                let mut clause = RawDocument::new();
                clause.insert(foreign_key, Value::Object(term));
                run_relation_query(&finder, &decl, clause, criteria)?
            }
            JoinKey::Key(value) => {
                let mut clause = RawDocument::new();
                clause.insert(foreign_key, value);
                run_relation_query(&finder, &decl, clause, criteria)?
            }
        };

        self.related.insert(name.to_string(), related);
        Ok(&self.related[name])
    }

    /// The cached relation value, if any. Does not resolve.
    pub fn related_mut(&mut self, name: &str) -> Option<&mut Related> {
        self.related.get_mut(name)
    }

    /// Remove and hand back the cached relation value. The next read
    /// resolves again.
    pub fn take_related(&mut self, name: &str) -> Option<Related> {
        self.related.shift_remove(name)
    }

    /// Whether a resolved (or assigned) value is cached under `name`.
    pub fn has_related(&self, name: &str) -> bool {
        self.related.contains_key(name)
    }

    /// Store a value straight into the relation cache. No validation against
    /// the declaration, no merging with an existing value.
    pub(crate) fn write_related(&mut self, name: &str, value: Assign) {
        let related = match value {
            Assign::Value(Value::Null) => Related::Null,
            Assign::Value(raw) => Related::Raw(raw),
            Assign::Single(model) => Related::Model(model),
            Assign::Multi(models) => Related::Models(models.into_models()),
            Assign::Related(related) => related,
        };
        self.related.insert(name.to_string(), related);
    }
}

/// Run the keyed lookup for a relation. Criteria layering: caller criteria
/// first, the declared filter over it, the join term last.
fn run_relation_query(
    finder: &Finder,
    decl: &RelationDecl,
    key_clause: RawDocument,
    criteria: Option<&RawDocument>,
) -> Result<Related, ModelError> {
    let mut filter = criteria.cloned().unwrap_or_default();
    if let Some(declared) = decl.filter.as_ref().and_then(Value::as_object) {
        merge_filter(&mut filter, declared);
    }
    merge_filter(&mut filter, &key_clause);

    Ok(match decl.kind {
        RelationKind::One => match finder.find_one(&filter)? {
            None => Related::Null,
            Some(mut model) => match decl.shape {
                ReturnShape::Array => Related::Document(model.get_document(None)?),
                _ => Related::Model(model),
            },
        },
        RelationKind::Many => match decl.shape {
            ReturnShape::Array => Related::Documents(finder.find(&filter)?.collect_documents()?),
            ReturnShape::Model => Related::Models(finder.find_all(&filter)?),
            ReturnShape::Cursor => Related::Cursor(finder.find(&filter)?),
        },
    })
}
