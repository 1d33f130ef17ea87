//! Error types for the document-model layer.

use thiserror::Error;

/// Storage backend errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn malformed_document(message: impl Into<String>) -> Self {
        Self::MalformedDocument(message.into())
    }
}

/// Model mapping errors.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{model} does not have a sub-document \"{name}\"")]
    UnknownSubDocument { model: String, name: String },

    #[error("Unexpected {found} value for sub-document \"{name}\" (null, mapping, model or array model expected)")]
    InvalidSubDocumentValue { name: String, found: String },

    #[error("{model} does not have a relation \"{name}\"")]
    UnknownRelation { model: String, name: String },

    #[error("No model schema registered under \"{0}\"")]
    UnknownModel(String),

    #[error("Invalid declaration \"{name}\" on {model}: {reason}")]
    InvalidDeclaration {
        model: String,
        name: String,
        reason: String,
    },

    #[error("{model} has no primary key value")]
    MissingPrimaryKey { model: String },

    #[error("No storage connection registered (install one with set_global_connection or construct the model with an explicit connection)")]
    MissingConnection,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ModelError {
    pub fn unknown_sub_document(model: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownSubDocument {
            model: model.into(),
            name: name.into(),
        }
    }

    pub fn invalid_sub_document_value(name: impl Into<String>, found: impl Into<String>) -> Self {
        Self::InvalidSubDocumentValue {
            name: name.into(),
            found: found.into(),
        }
    }

    pub fn unknown_relation(model: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownRelation {
            model: model.into(),
            name: name.into(),
        }
    }

    pub fn unknown_model(name: impl Into<String>) -> Self {
        Self::UnknownModel(name.into())
    }

    pub fn invalid_declaration(
        model: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidDeclaration {
            model: model.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_primary_key(model: impl Into<String>) -> Self {
        Self::MissingPrimaryKey {
            model: model.into(),
        }
    }
}
