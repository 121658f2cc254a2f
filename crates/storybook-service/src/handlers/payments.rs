//! Payment provider webhook.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use super::{parse_body, WebhookResponse};
use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::WebhookEvent;

/// Signature header set by the provider.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Handle a signed payment event.
///
/// The raw body is verified before it is parsed.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    state.payments.verify(&body, signature)?;

    let event: WebhookEvent = parse_body(&body)?;
    let outcome = state.payments.handle(&event).await?;

    tracing::debug!(event_id = %event.id, outcome = ?outcome, "Payment webhook processed");
    Ok(Json(WebhookResponse::ok(outcome.message())))
}
