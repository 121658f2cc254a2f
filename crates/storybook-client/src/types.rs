//! Request and response types for the storybook client.

use serde::{Deserialize, Serialize};

pub use storybook_core::{
    ChildGender, StoryBasicInfo, StoryDetails, StoryId, UserStory,
};

/// Checkout request.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Buyer.
    pub user_id: String,
    /// Buyer email.
    pub user_email: String,
    /// Template being personalized.
    pub template_id: String,
    /// Story id; the service composes one when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_id: Option<String>,
    /// Child's name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_name: Option<String>,
    /// Child's age.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_age: Option<String>,
    /// Child's gender.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_gender: Option<ChildGender>,
    /// Already-transformed photo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformed_photo_url: Option<String>,
}

/// Checkout response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// Hosted checkout page to redirect to.
    pub checkout_url: String,
    /// Provider session id.
    pub session_id: String,
    /// Story the payment is for.
    pub story_id: StoryId,
}

/// Start a photo transform.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BeginTransformRequest<'a> {
    pub user_id: &'a str,
    pub template_id: &'a str,
    pub photo_url: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BeginTransformResponse {
    pub transform_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TransformStatusRequest<'a> {
    pub user_id: &'a str,
    pub transform_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<&'a str>,
}

/// Outcome of one transform poll.
///
/// A terminal outcome is returned by exactly one poll; later polls report
/// `Pending` again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformPoll {
    /// Still running, or already consumed.
    Pending,
    /// Finished with an image.
    Completed {
        /// Result image.
        transformed_image_url: String,
    },
    /// Finished with an error.
    Failed {
        /// Error text.
        error: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TransformStatusBody {
    pub status: String,
    #[serde(default)]
    pub transformed_image_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl From<TransformStatusBody> for TransformPoll {
    fn from(body: TransformStatusBody) -> Self {
        match body.status.as_str() {
            "completed" => Self::Completed {
                transformed_image_url: body.transformed_image_url.unwrap_or_default(),
            },
            "failed" => Self::Failed {
                error: body.error.unwrap_or(body.message),
            },
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TemplateList {
    pub templates: Vec<StoryBasicInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StoryList {
    pub stories: Vec<UserStory>,
}

/// Error body returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Always `false`.
    #[serde(default)]
    pub success: bool,
    /// Human-readable message.
    pub message: String,
    /// Machine-readable code.
    pub code: String,
}
