//! Checkout initiation.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use super::parse_body;
use crate::error::ApiError;
use crate::reconcile::{CheckoutRequest, CheckoutResponse};
use crate::state::AppState;

/// Create a pending story and a hosted checkout session for it.
pub async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let request: CheckoutRequest = parse_body(&body)?;
    let response = state.checkout.create_session(request).await?;
    Ok(Json(response))
}
