//! Error types for storybook domain types.

use crate::ids::IdError;

/// Result type for storybook domain operations.
pub type Result<T> = std::result::Result<T, StorybookError>;

/// Errors that can occur when building or validating domain records.
#[derive(Debug, thiserror::Error)]
pub enum StorybookError {
    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// A required field is missing or malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// A record that must already exist was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Record key.
        id: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorybookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
