//! Story generation callback.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use storybook_core::{BookDetails, StoryId, UserId, UserStory};
use storybook_store::{Mutation, RecordKey, Store, StoreExt};

use crate::error::ApiError;

/// Final callback payload from the automation platform.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoryWebhook {
    /// Callback kind; only `creation` is sent today.
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    /// Callback data.
    #[serde(default)]
    pub data: StoryWebhookData,
}

/// Callback data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryWebhookData {
    /// Story.
    #[serde(default)]
    pub story_id: Option<String>,
    /// Owner.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Generated content.
    #[serde(default)]
    pub book_details: Option<BookDetails>,
}

/// Merges generated content into paid stories.
pub struct StoryCompletion {
    store: Arc<dyn Store>,
}

impl StoryCompletion {
    /// Create the service.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate a callback and apply it.
    pub fn handle(&self, webhook: StoryWebhook) -> Result<UserStory, ApiError> {
        let data = webhook.data;
        let (Some(story_id), Some(user_id), Some(book)) =
            (data.story_id, data.user_id, data.book_details)
        else {
            return Err(ApiError::BadRequest(
                "Missing required fields: storyId, userId, bookDetails".into(),
            ));
        };
        if let Some(kind) = webhook.event_type.as_deref().filter(|k| *k != "creation") {
            tracing::debug!(kind = %kind, "Story webhook with unexpected type");
        }

        self.complete(&UserId::new(user_id)?, &StoryId::new(story_id)?, &book)
    }

    /// Merge `book` into an existing story and mark it completed.
    ///
    /// Payment fields written concurrently are preserved because the merge
    /// runs against the current version of the record.
    pub fn complete(
        &self,
        user_id: &UserId,
        story_id: &StoryId,
        book: &BookDetails,
    ) -> Result<UserStory, ApiError> {
        let key = RecordKey::user_story(user_id, story_id);
        let now = Utc::now();
        let updated = self
            .store
            .update_record::<UserStory, ApiError, _>(&key, |current| {
                let mut story = current.ok_or_else(|| {
                    tracing::warn!(key = %key, "Story callback for unknown story");
                    ApiError::NotFound(format!("Story not found: {story_id}"))
                })?;
                story.apply_book_details(book, now);
                Ok(Mutation::Put(story))
            })?;

        let story = updated
            .after
            .ok_or_else(|| ApiError::Internal("story update produced no record".into()))?;
        tracing::info!(
            story_id = %story.id,
            user_id = %story.user_id,
            pages = %book.number_of_pages,
            "Story generation completed"
        );
        Ok(story)
    }
}
