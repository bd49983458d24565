pub mod rules;
pub mod validator;

pub use rules::{MissingField, RequiredFieldRule, ValidationRule};
pub use validator::{ValidationError, Validator};
