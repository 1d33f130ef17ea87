//! Model scenarios.
//!
//! A scenario tells a model which operation it is being prepared for, which
//! in turn selects the validators that apply to a write. New models start in
//! [`Scenario::Insert`]; models populated from stored documents run in
//! [`Scenario::Update`].

use std::fmt;

/// The operation a model instance is currently staged for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scenario {
    /// A new document that has never been persisted.
    #[default]
    Insert,
    /// A document loaded from the store and being modified.
    Update,
    /// A model used to collect search criteria.
    Search,
    /// Application-defined scenario.
    Custom(String),
}

impl Scenario {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Search => "search",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Scenario {
    fn from(name: &str) -> Self {
        match name {
            "insert" => Self::Insert,
            "update" => Self::Update,
            "search" => Self::Search,
            other => Self::Custom(other.to_string()),
        }
    }
}
