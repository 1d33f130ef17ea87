//! Bracket paths for nested attribute names.
//!
//! Form inputs address nested attributes as `address[city]` or
//! `items[0][sku]`. The parser maps such a path back to the declared
//! sub-document that owns it; requiredness checks then recurse through the
//! embedded models.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ModelError;
use crate::model::{DocumentModel, SubDocument};
use crate::schema::validators::ValidatorKind;

lazy_static! {
    /// Captures every `[...]` group of a bracket path.
    static ref BRACKET_GROUPS: Regex = Regex::new(r"\[(.*?)\]").unwrap();
}

/// A group counts as numeric when removing digits leaves nothing, so an
/// empty group (`items[]`) is numeric too.
fn is_numeric_group(group: &str) -> bool {
    group.chars().all(|c| c.is_ascii_digit())
}

fn bracket_groups(path: &str) -> Vec<String> {
    BRACKET_GROUPS
        .captures_iter(path)
        .map(|captures| captures[1].to_string())
        .collect()
}

impl DocumentModel {
    /// Reduce a bracket path to the declared sub-document name it starts
    /// with. Declarations are scanned in order and the first `name[` prefix
    /// wins, so declaration order decides overlapping prefixes. Paths that
    /// match no declaration come back unchanged.
    pub fn parse_attribute_name<'a>(&self, raw: &'a str) -> &'a str {
        if raw.is_empty() || !raw.contains('[') {
            return raw;
        }
        for name in self.schema.sub_documents().keys() {
            if raw.len() > name.len()
                && raw.starts_with(name.as_str())
                && raw.as_bytes()[name.len()] == b'['
            {
                return &raw[..name.len()];
            }
        }
        raw
    }

    /// Whether `path` is covered by a required validator in the current
    /// scenario. Bracket paths recurse through the owning sub-document:
    /// `items[0][sku]` asks whether any current entry requires `sku`,
    /// `address[city]` asks the embedded model about `city`.
    pub fn is_attribute_required(&mut self, path: &str) -> Result<bool, ModelError> {
        let base = self.parse_attribute_name(path).to_string();
        for validator in self.schema.validators_for(&base, &self.scenario) {
            match validator.kind() {
                ValidatorKind::Required => return Ok(true),
                ValidatorKind::SubDocument
                    if self.schema.sub_documents().contains_key(&base) =>
                {
                    if self.nested_attribute_required(&base, path)? {
                        return Ok(true);
                    }
                }
                _ => {}
            }
        }
        Ok(false)
    }

    fn nested_attribute_required(&mut self, base: &str, path: &str) -> Result<bool, ModelError> {
        self.resolve_sub_document(base)?;

        // A numeric first group indexes into a list, and the group after it
        // names the nested attribute. A path with no index asks about the
        // first group directly; no groups at all fall back to the base name.
        let groups = bracket_groups(path);
        let nested = match groups.first() {
            None => base.to_string(),
            Some(first) if is_numeric_group(first) => match groups.get(1) {
                Some(second) => second.clone(),
                None => return Ok(false),
            },
            Some(first) => first.clone(),
        };

        match self.sub_documents.get_mut(base) {
            Some(SubDocument::Single(model)) => model.is_attribute_required(&nested),
            Some(SubDocument::Multi(models)) => {
                for item in models.iter_mut() {
                    if item.is_attribute_required(&nested)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
