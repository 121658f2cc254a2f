//! Error types for storybook storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A key segment was empty or contained a reserved character.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A conditional write lost against a concurrent writer.
    #[error("version conflict on {key}: expected {expected:?}, found {actual:?}")]
    Conflict {
        /// Record path.
        key: String,
        /// Version the caller read (`None` = expected absent).
        expected: Option<u64>,
        /// Version currently stored (`None` = absent).
        actual: Option<u64>,
    },

    /// An atomic update kept losing to concurrent writers.
    #[error("update of {key} abandoned after {attempts} conflicting attempts")]
    RetriesExhausted {
        /// Record path.
        key: String,
        /// Attempts made.
        attempts: u32,
    },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<storybook_core::IdError> for StoreError {
    fn from(err: storybook_core::IdError) -> Self {
        Self::InvalidKey(err.to_string())
    }
}
