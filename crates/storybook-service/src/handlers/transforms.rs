//! Photo transform endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use storybook_core::{JobId, TemplateId, TransformStatus, UserId};

use super::parse_body;
use crate::auth::ApiKeyAuth;
use crate::error::ApiError;
use crate::reconcile::{TransformEvent, TransformStatusRequest, TransformStatusResponse};
use crate::state::AppState;

/// Event acknowledgement.
#[derive(Debug, Serialize)]
pub struct TransformEventResponse {
    /// Always `true`.
    pub success: bool,
    /// Human-readable outcome.
    pub message: &'static str,
    /// Status after the event; absent when there was no record to update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TransformStatus>,
}

/// Request to start a transform job.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginTransformRequest {
    /// Owner.
    pub user_id: UserId,
    /// Template the photo is for.
    pub template_id: TemplateId,
    /// Source photo.
    pub photo_url: String,
}

/// Started job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginTransformResponse {
    /// Always `true`.
    pub success: bool,
    /// Id to poll with.
    pub transform_id: JobId,
}

/// Apply a lifecycle event from the automation platform.
pub async fn transform_webhook(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    body: String,
) -> Result<Json<TransformEventResponse>, ApiError> {
    let event: TransformEvent = parse_body(&body)?;
    let status = state.transforms.apply_event(event)?;
    let message = if status.is_some() {
        "Transform status updated"
    } else {
        "No active transform for this job"
    };
    Ok(Json(TransformEventResponse {
        success: true,
        message,
        status,
    }))
}

/// Poll for a transform result. Terminal results are returned once.
pub async fn transform_status(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    body: String,
) -> Result<Json<TransformStatusResponse>, ApiError> {
    let request: TransformStatusRequest = parse_body(&body)?;
    Ok(Json(state.transforms.resolve_request(request)?))
}

/// Register a transform job and hand it to the worker.
pub async fn begin_transform(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    body: String,
) -> Result<Json<BeginTransformResponse>, ApiError> {
    let request: BeginTransformRequest = parse_body(&body)?;
    if request.photo_url.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing required field: photoUrl".into()));
    }

    let transform_id = state
        .transforms
        .begin(request.user_id, request.template_id, request.photo_url)
        .await?;

    Ok(Json(BeginTransformResponse {
        success: true,
        transform_id,
    }))
}
