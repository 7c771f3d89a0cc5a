use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown property type: {0}")]
    UnknownPropertyType(String),

    #[error("cannot convert {found} to {expected}")]
    Conversion { expected: String, found: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
