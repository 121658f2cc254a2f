//! Outbound calls to the automation platform.
//!
//! The platform runs the photo transform and the story generation. It is an
//! opaque asynchronous worker: we start jobs here and it reports back through
//! the transform and story webhooks.

pub mod client;

use async_trait::async_trait;
use serde::Serialize;

use storybook_core::{JobId, Personalization, StoryId, TemplateId, UserId};

pub use client::{AutomationClient, AutomationError};

/// Job data sent when a paid story should be generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryGenerationRequest {
    /// Story to generate.
    pub story_id: StoryId,
    /// Owner.
    pub user_id: UserId,
    /// Template the story is based on.
    pub template_id: TemplateId,
    /// Checkout session that paid for it.
    pub session_id: String,
    /// Owner email at checkout time.
    pub user_email: String,
    /// Child details and transformed photo the story is personalized with.
    #[serde(flatten)]
    pub personalization: Personalization,
}

/// Job data sent when a photo should be transformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoTransformRequest {
    /// Owner, named `uid` to match the callback payload.
    #[serde(rename = "uid")]
    pub user_id: UserId,
    /// Job id echoed back in every callback.
    pub transform_id: JobId,
    /// Template the photo is prepared for.
    pub template_id: TemplateId,
    /// Source photo.
    pub photo_url: String,
}

/// The automation platform as seen by the reconciliation services.
#[async_trait]
pub trait AutomationPlatform: Send + Sync {
    /// Start story generation for a paid story.
    async fn trigger_story_generation(
        &self,
        request: &StoryGenerationRequest,
    ) -> Result<(), AutomationError>;

    /// Start a photo transform job.
    async fn request_photo_transform(
        &self,
        request: &PhotoTransformRequest,
    ) -> Result<(), AutomationError>;
}
