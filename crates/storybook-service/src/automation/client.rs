//! Automation platform HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{AutomationPlatform, PhotoTransformRequest, StoryGenerationRequest};

/// Error type for automation calls.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    /// The webhook URL for this action is not configured.
    #[error("automation {0} webhook not configured")]
    NotConfigured(&'static str),

    /// HTTP request failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered with a non-success status.
    #[error("automation platform returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for the logs.
        body: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    action: &'static str,
    data: &'a T,
}

/// Automation platform client.
#[derive(Debug, Clone)]
pub struct AutomationClient {
    client: Client,
    api_key: Option<String>,
    story_url: Option<String>,
    transform_url: Option<String>,
}

impl AutomationClient {
    /// Create a new automation client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_key: Option<String>,
        story_url: Option<String>,
        transform_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AutomationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AutomationError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            story_url,
            transform_url,
        })
    }

    async fn post<T: Serialize + Sync>(
        &self,
        url: &str,
        action: &'static str,
        data: &T,
    ) -> Result<(), AutomationError> {
        let mut request = self.client.post(url).json(&Envelope { action, data });
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AutomationError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AutomationPlatform for AutomationClient {
    async fn trigger_story_generation(
        &self,
        request: &StoryGenerationRequest,
    ) -> Result<(), AutomationError> {
        let url = self
            .story_url
            .as_deref()
            .ok_or(AutomationError::NotConfigured("story"))?;

        tracing::debug!(
            story_id = %request.story_id,
            user_id = %request.user_id,
            "Triggering story generation"
        );
        self.post(url, "create_story", request).await
    }

    async fn request_photo_transform(
        &self,
        request: &PhotoTransformRequest,
    ) -> Result<(), AutomationError> {
        let url = self
            .transform_url
            .as_deref()
            .ok_or(AutomationError::NotConfigured("transform"))?;

        tracing::debug!(
            transform_id = %request.transform_id,
            user_id = %request.user_id,
            "Requesting photo transform"
        );
        self.post(url, "transform_photo", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storybook_core::{Personalization, StoryId, TemplateId, UserId};

    #[tokio::test]
    async fn unconfigured_url_is_reported() {
        let client = AutomationClient::new(None, None, None, Duration::from_secs(1)).unwrap();
        let request = StoryGenerationRequest {
            story_id: StoryId::new("s1").unwrap(),
            user_id: UserId::new("u1").unwrap(),
            template_id: TemplateId::new("t1").unwrap(),
            session_id: "cs_1".into(),
            user_email: "a@b.com".into(),
            personalization: Personalization {
                child_name: "Mia".into(),
                ..Personalization::default()
            },
        };

        let err = client.trigger_story_generation(&request).await.unwrap_err();
        assert!(matches!(err, AutomationError::NotConfigured("story")));
    }

    #[test]
    fn envelope_shape() {
        let request = StoryGenerationRequest {
            story_id: StoryId::new("s1").unwrap(),
            user_id: UserId::new("u1").unwrap(),
            template_id: TemplateId::new("t1").unwrap(),
            session_id: "cs_1".into(),
            user_email: "a@b.com".into(),
            personalization: Personalization {
                child_name: "Mia".into(),
                ..Personalization::default()
            },
        };
        let json = serde_json::to_value(Envelope {
            action: "create_story",
            data: &request,
        })
        .unwrap();
        assert_eq!(json["action"], "create_story");
        assert_eq!(json["data"]["storyId"], "s1");
        assert_eq!(json["data"]["sessionId"], "cs_1");
        assert_eq!(json["data"]["userEmail"], "a@b.com");
        assert_eq!(json["data"]["childName"], "Mia");
    }
}
