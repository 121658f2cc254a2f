//! Client error types.

/// Errors that can occur when using the storybook client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The shared API key was missing or wrong.
    #[error("unauthorized")]
    Unauthorized,

    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The photo transform finished with an error.
    #[error("transform failed: {0}")]
    TransformFailed(String),

    /// The photo transform did not finish within the polling budget.
    #[error("transform still pending after {attempts} polls")]
    TransformTimedOut {
        /// Polls made.
        attempts: u32,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
