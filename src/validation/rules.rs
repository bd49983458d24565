use crate::extract::{FieldMap, RequiredField};
use std::fmt;

/// A required field that was absent or falsy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    pub label: String,
    pub key: String,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (source key '{}')", self.label, self.key)
    }
}

pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, fields: &FieldMap) -> Option<MissingField>;
}

pub struct RequiredFieldRule {
    field: RequiredField,
}

impl RequiredFieldRule {
    pub fn new(field: RequiredField) -> Self {
        Self { field }
    }
}

impl ValidationRule for RequiredFieldRule {
    fn name(&self) -> &'static str {
        "RequiredField"
    }

    fn check(&self, fields: &FieldMap) -> Option<MissingField> {
        if fields.is_truthy(self.field.key) {
            return None;
        }
        Some(MissingField {
            label: self.field.label.to_string(),
            key: self.field.key.to_string(),
        })
    }
}
