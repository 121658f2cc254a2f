//! Catalog read endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use storybook_core::{StoryBasicInfo, StoryDetails, TemplateId};

use crate::error::ApiError;
use crate::state::AppState;

/// Catalog listing.
#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    /// Cards ordered by book number.
    pub templates: Vec<StoryBasicInfo>,
}

/// List catalog cards.
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TemplateListResponse>, ApiError> {
    let templates = state.catalog_cache.templates().await?;
    Ok(Json(TemplateListResponse {
        templates: templates.as_ref().clone(),
    }))
}

/// The current weekly favorite.
pub async fn weekly_favorite(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StoryBasicInfo>, ApiError> {
    state
        .catalog_cache
        .weekly_favorite()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No weekly favorite".into()))
}

/// Reader content for one template.
pub async fn template_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StoryDetails>, ApiError> {
    let id = TemplateId::new(id)?;
    state
        .catalog_cache
        .details(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Story template not found: {id}")))
}
