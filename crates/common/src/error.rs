//! Error types for tfprobe

use thiserror::Error;

/// Result type alias using the tfprobe common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or parsing shared domain values
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid variable {name}: {reason}")]
    InvalidVariable { name: String, reason: String },

    #[error("Invalid resource id '{id}': {reason}")]
    InvalidResourceId { id: String, reason: String },

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

impl Error {
    pub(crate) fn variable(name: &str, reason: impl Into<String>) -> Self {
        Error::InvalidVariable {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
