//! Solidoc: a document-model mapping layer for schemaless stores.
//!
//! Models declare their shape once in a [`schema::ModelSchema`] and read and
//! write everything else dynamically. Values live in three layered stores
//! behind one access protocol:
//!
//! - **Plain attributes**: raw values, held as-is.
//! - **Sub-documents**: embedded mappings materialized as typed models.
//! - **Relations**: documents in other collections, resolved lazily and
//!   cached, joined through stored keys or `{$ref, $id}` references.
//!
//! Storage is pluggable through [`store::StorageBackend`]; an in-memory
//! backend ships for tests and development.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use serde_json::json;
//! use solidoc::{Connection, DocumentModel, MemoryBackend, ModelSchema, Scenario};
//!
//! ModelSchema::builder("Address").fields(["city", "zip"]).register()?;
//! ModelSchema::builder("Customer")
//!     .fields(["name"])
//!     .embeds_one("address", "Address")
//!     .register()?;
//!
//! let conn = Arc::new(Connection::new(Arc::new(MemoryBackend::new())));
//! let schema = ModelSchema::lookup("Customer")?;
//! let mut customer = DocumentModel::with_connection(schema, Scenario::Insert, conn);
//! customer.set("name", "Ana")?;
//! customer.set("address", json!({"city": "Lyon"}))?;
//! customer.save()?;
//! ```

// Allow some clippy lints that are stylistic and not critical
#![allow(clippy::module_inception)]
#![allow(clippy::result_large_err)]

pub mod error;
pub mod model;
pub mod scenario;
pub mod schema;
pub mod store;

pub use error::{ModelError, StoreError};
pub use model::{
    ArrayModel, Assign, Attr, DocumentModel, Finder, FnHook, HookOutcome, LifecycleEvent,
    LifecycleHook, Related, SubDocument,
};
pub use scenario::Scenario;
pub use schema::validators::{
    RequiredValidator, SubDocumentValidator, ValidationError, Validator,
};
pub use schema::{ModelSchema, RelationDecl, ReturnShape, SchemaBuilder};
pub use store::memory::MemoryBackend;
pub use store::{
    global_connection, set_global_connection, Connection, Cursor, DocRef, JoinKey, RawDocument,
    StorageBackend,
};
