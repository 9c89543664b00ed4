//! Error types for identifier and payload validation.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("identifier `{0}` must not be empty")]
    Empty(&'static str),
    #[error("invalid IBAN `{0}`")]
    InvalidIban(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unknown {kind} `{value}`")]
    UnknownVariant { kind: &'static str, value: String },
    #[error("{0}")]
    Message(String),
}
