//! User story endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::{Stream, StreamExt};
use serde::Serialize;

use storybook_core::{StoryId, UserId, UserStory};
use storybook_store::{ChangeOp, RecordKey, StoreExt};

use super::{parse_body, WebhookResponse};
use crate::auth::ApiKeyAuth;
use crate::error::ApiError;
use crate::reconcile::StoryWebhook;
use crate::state::AppState;

/// Story list response.
#[derive(Debug, Serialize)]
pub struct StoryListResponse {
    /// Stories, newest first.
    pub stories: Vec<UserStory>,
}

/// Apply the automation platform's final story callback.
pub async fn story_webhook(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let webhook: StoryWebhook = parse_body(&body)?;
    state.stories.handle(webhook)?;
    Ok(Json(WebhookResponse::ok("Story updated successfully")))
}

/// List a user's stories.
pub async fn list_stories(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    Path(user_id): Path<String>,
) -> Result<Json<StoryListResponse>, ApiError> {
    let user_id = UserId::new(user_id)?;
    let mut stories: Vec<UserStory> = state
        .store
        .list_records::<UserStory>(&RecordKey::user_stories(&user_id))?
        .into_iter()
        .map(|(_, record)| record.value)
        .collect();
    stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(StoryListResponse { stories }))
}

/// Fetch one story.
pub async fn get_story(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    Path((user_id, story_id)): Path<(String, String)>,
) -> Result<Json<UserStory>, ApiError> {
    let user_id = UserId::new(user_id)?;
    let story_id = StoryId::new(story_id)?;

    state
        .store
        .get_record::<UserStory>(&RecordKey::user_story(&user_id, &story_id))?
        .map(|record| Json(record.value))
        .ok_or_else(|| ApiError::NotFound(format!("Story not found: {story_id}")))
}

/// Stream changes to a user's stories as server-sent events.
///
/// Each event is named after the change (`put` or `delete`) and carries the
/// change as JSON.
pub async fn story_events(
    State(state): State<Arc<AppState>>,
    _auth: ApiKeyAuth,
    Path(user_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let user_id = UserId::new(user_id)?;
    let subscription = state.store.subscribe(&RecordKey::user_stories(&user_id));
    tracing::debug!(user_id = %user_id, "Story event stream opened");

    let stream = subscription.into_stream().map(|change| {
        let name = match change.op {
            ChangeOp::Put => "put",
            ChangeOp::Delete => "delete",
        };
        Event::default().event(name).json_data(&change)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
