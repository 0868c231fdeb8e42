//! Validation of records against the JSON schema of their stream.

mod selection;
mod validator;

pub use selection::FieldSelector;
pub use validator::{RecordSchemaValidator, ValidationSession, declared_fields};
