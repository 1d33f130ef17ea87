//! Validator declarations and execution logic.
//!
//! Validators hang off a [`ModelSchema`](crate::schema::ModelSchema) and are
//! filtered by scenario before they run. The attribute machinery only cares
//! about two families, tagged through [`ValidatorKind`]: `Required` drives
//! `is_attribute_required`, and `SubDocument` makes requiredness checks
//! recurse into embedded models.

use serde_json::Value;

use crate::model::{Attr, DocumentModel, SubDocument};
use crate::scenario::Scenario;

/// Validator families the attribute machinery recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorKind {
    /// Attribute must carry a non-blank value.
    Required,
    /// Validation recurses into an embedded sub-document.
    SubDocument,
    /// Anything else; opaque to the core.
    Other,
}

/// A validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub attribute: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}

/// A validation rule covering one or more attributes.
pub trait Validator: Send + Sync {
    /// Family tag. The default is [`ValidatorKind::Other`].
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Other
    }

    /// The attributes this validator covers.
    fn attributes(&self) -> &[String];

    /// Whether the validator is active in the given scenario.
    fn applies_to(&self, _scenario: &Scenario) -> bool {
        true
    }

    /// Validate the covered attributes on `model`.
    fn validate(&self, model: &mut DocumentModel) -> Vec<ValidationError>;
}

/// Run every validator active in the model's current scenario.
pub fn run_validators(model: &mut DocumentModel) -> Vec<ValidationError> {
    let validators = model.schema().validators_for_scenario(model.scenario());
    let mut errors = Vec::new();
    for validator in validators {
        errors.extend(validator.validate(model));
    }
    errors
}

fn to_scenarios<I>(scenarios: I) -> Vec<Scenario>
where
    I: IntoIterator<Item = Scenario>,
{
    scenarios.into_iter().collect()
}

/// Presence validation: the attribute must resolve to a non-null, non-empty value.
#[derive(Debug, Clone)]
pub struct RequiredValidator {
    attributes: Vec<String>,
    on: Vec<Scenario>,
}

impl RequiredValidator {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
            on: Vec::new(),
        }
    }

    /// Restrict the validator to the given scenarios. Unrestricted validators
    /// run everywhere.
    pub fn on<I>(mut self, scenarios: I) -> Self
    where
        I: IntoIterator<Item = Scenario>,
    {
        self.on = to_scenarios(scenarios);
        self
    }
}

impl Validator for RequiredValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Required
    }

    fn attributes(&self) -> &[String] {
        &self.attributes
    }

    fn applies_to(&self, scenario: &Scenario) -> bool {
        self.on.is_empty() || self.on.contains(scenario)
    }

    fn validate(&self, model: &mut DocumentModel) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for attribute in &self.attributes {
            let blank = match model.get(attribute) {
                Ok(Attr::Null) => true,
                Ok(Attr::Value(Value::String(s))) => s.is_empty(),
                Ok(_) => false,
                // Resolution failures are declaration problems, not blanks.
                Err(_) => false,
            };
            if blank {
                errors.push(ValidationError::new(attribute, "can't be blank"));
            }
        }
        errors
    }
}

/// Validation that recurses into an embedded sub-document, reporting nested
/// errors under bracket paths (`address[city]`, `items[0][sku]`).
#[derive(Debug, Clone)]
pub struct SubDocumentValidator {
    attributes: Vec<String>,
    on: Vec<Scenario>,
}

impl SubDocumentValidator {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
            on: Vec::new(),
        }
    }

    pub fn on<I>(mut self, scenarios: I) -> Self
    where
        I: IntoIterator<Item = Scenario>,
    {
        self.on = to_scenarios(scenarios);
        self
    }
}

impl Validator for SubDocumentValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::SubDocument
    }

    fn attributes(&self) -> &[String] {
        &self.attributes
    }

    fn applies_to(&self, scenario: &Scenario) -> bool {
        self.on.is_empty() || self.on.contains(scenario)
    }

    fn validate(&self, model: &mut DocumentModel) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for attribute in &self.attributes {
            match model.sub_document_mut(attribute) {
                Ok(SubDocument::Single(sub)) => {
                    for err in run_validators(sub) {
                        errors.push(ValidationError::new(
                            format!("{}[{}]", attribute, err.attribute),
                            err.message,
                        ));
                    }
                }
                Ok(SubDocument::Multi(subs)) => {
                    for (index, item) in subs.iter_mut().enumerate() {
                        for err in run_validators(item) {
                            errors.push(ValidationError::new(
                                format!("{}[{}][{}]", attribute, index, err.attribute),
                                err.message,
                            ));
                        }
                    }
                }
                Err(_) => errors.push(ValidationError::new(attribute, "is invalid")),
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_validator_scenario_filter() {
        let v = RequiredValidator::new(["sku"]).on([Scenario::Insert]);
        assert!(v.applies_to(&Scenario::Insert));
        assert!(!v.applies_to(&Scenario::Update));

        let unrestricted = RequiredValidator::new(["sku"]);
        assert!(unrestricted.applies_to(&Scenario::Search));
    }

    #[test]
    fn test_validator_kinds() {
        assert_eq!(
            RequiredValidator::new(["a"]).kind(),
            ValidatorKind::Required
        );
        assert_eq!(
            SubDocumentValidator::new(["a"]).kind(),
            ValidatorKind::SubDocument
        );
    }
}
