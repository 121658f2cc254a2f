//! API handlers.

pub mod catalog;
pub mod checkout;
pub mod health;
pub mod payments;
pub mod stories;
pub mod templates;
pub mod transforms;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;

/// Acknowledgement body shared by the webhook endpoints.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the delivery was applied.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Action-specific payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl WebhookResponse {
    /// A successful acknowledgement.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Parse a raw JSON body, mapping failures to 400.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}
