//! Catalog webhook.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::json;

use super::{parse_body, WebhookResponse};
use crate::auth::ApiKeyAuth;
use crate::error::ApiError;
use crate::reconcile::CatalogRequest;
use crate::state::AppState;

/// Apply a catalog action from the automation platform.
pub async fn catalog_webhook(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let request: CatalogRequest = parse_body(&body)?;
    let outcome = state.catalog.handle(request).await?;
    let response = WebhookResponse::ok(outcome.message);
    Ok(Json(match outcome.created_id {
        Some(id) => response.with_data(json!({ "id": id })),
        None => response,
    }))
}
