use crate::extract::{FieldMap, KeySet};
use crate::validation::rules::{MissingField, RequiredFieldRule, ValidationRule};
use thiserror::Error;
use tracing::debug;

/// Every required field that failed, reported together.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("missing required onboarding fields:{}", format_missing(.missing))]
pub struct ValidationError {
    pub missing: Vec<MissingField>,
}

fn format_missing(missing: &[MissingField]) -> String {
    missing.iter().map(|m| format!("\n  - {}", m)).collect()
}

pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new(keys: &KeySet) -> Self {
        Self::with_rules(
            keys.required()
                .iter()
                .map(|field| Box::new(RequiredFieldRule::new(*field)) as Box<dyn ValidationRule>)
                .collect(),
        )
    }

    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    pub fn validate(&self, fields: &FieldMap) -> Result<(), ValidationError> {
        let missing: Vec<MissingField> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let result = rule.check(fields);
                if let Some(m) = &result {
                    debug!(rule = rule.name(), key = %m.key, "required field missing");
                }
                result
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { missing })
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&KeySet::mde())
    }
}
