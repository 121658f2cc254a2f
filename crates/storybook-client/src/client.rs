//! Storybook HTTP client implementation.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BeginTransformRequest, BeginTransformResponse, CheckoutRequest,
    CheckoutResponse, StoryBasicInfo, StoryDetails, StoryList, TemplateList, TransformPoll,
    TransformStatusBody, TransformStatusRequest, UserStory,
};

/// Storybook API client.
#[derive(Debug, Clone)]
pub struct StorybookClient {
    client: Client,
    base_url: String,
    api_key: String,
    options: ClientOptions,
}

impl StorybookClient {
    /// Create a new storybook client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the storybook service (e.g., `"http://storybook:8080"`)
    /// * `api_key` - Shared API key for authenticated endpoints
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new storybook client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            options,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("x-api-key", &self.api_key)
    }

    /// Create a pending story and a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, ClientError> {
        let response = self
            .client
            .post(self.url("/api/create-checkout-session"))
            .json(request)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Start a photo transform. Returns the job id to poll with.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn begin_transform(
        &self,
        user_id: &str,
        template_id: &str,
        photo_url: &str,
    ) -> Result<String, ClientError> {
        let request = BeginTransformRequest {
            user_id,
            template_id,
            photo_url,
        };
        let response = self
            .authed(self.client.post(self.url("/v1/transformations")))
            .json(&request)
            .send()
            .await?;

        let body: BeginTransformResponse = Self::handle_response(response).await?;
        Ok(body.transform_id)
    }

    /// Poll a transform once.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn transform_status(
        &self,
        user_id: &str,
        transform_id: &str,
        template_id: Option<&str>,
    ) -> Result<TransformPoll, ClientError> {
        let request = TransformStatusRequest {
            user_id,
            transform_id,
            template_id,
        };
        let response = self
            .authed(self.client.post(self.url("/api/photo-transform-status")))
            .json(&request)
            .send()
            .await?;

        let body: TransformStatusBody = Self::handle_response(response).await?;
        Ok(body.into())
    }

    /// Poll a transform until it finishes. Returns the transformed image URL.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::TransformFailed` if the worker reported an error,
    /// `ClientError::TransformTimedOut` if the polling budget ran out, or any
    /// request error.
    pub async fn wait_for_transform(
        &self,
        user_id: &str,
        transform_id: &str,
        template_id: Option<&str>,
    ) -> Result<String, ClientError> {
        let attempts = self.options.max_transform_polls;
        for attempt in 1..=attempts {
            match self.transform_status(user_id, transform_id, template_id).await? {
                TransformPoll::Completed {
                    transformed_image_url,
                } => return Ok(transformed_image_url),
                TransformPoll::Failed { error } => return Err(ClientError::TransformFailed(error)),
                TransformPoll::Pending => {
                    tracing::trace!(transform_id = %transform_id, attempt = %attempt, "Transform pending");
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(self.options.poll_interval_ms)).await;
                    }
                }
            }
        }
        Err(ClientError::TransformTimedOut { attempts })
    }

    /// Catalog cards ordered by book number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_templates(&self) -> Result<Vec<StoryBasicInfo>, ClientError> {
        let response = self.client.get(self.url("/v1/templates")).send().await?;
        let body: TemplateList = Self::handle_response(response).await?;
        Ok(body.templates)
    }

    /// The current weekly favorite, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn weekly_favorite(&self) -> Result<Option<StoryBasicInfo>, ClientError> {
        let response = self
            .client
            .get(self.url("/v1/templates/weekly-favorite"))
            .send()
            .await?;
        match Self::handle_response(response).await {
            Ok(card) => Ok(Some(card)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reader content for one template.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` for an unknown template, or any request error.
    pub async fn template_details(&self, template_id: &str) -> Result<StoryDetails, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/templates/{template_id}/details")))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// A user's stories, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn user_stories(&self, user_id: &str) -> Result<Vec<UserStory>, ClientError> {
        let response = self
            .authed(self.client.get(self.url(&format!("/v1/users/{user_id}/stories"))))
            .send()
            .await?;
        let body: StoryList = Self::handle_response(response).await?;
        Ok(body.stories)
    }

    /// One of a user's stories.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` for an unknown story, or any request error.
    pub async fn user_story(&self, user_id: &str, story_id: &str) -> Result<UserStory, ClientError> {
        let response = self
            .authed(
                self.client
                    .get(self.url(&format!("/v1/users/{user_id}/stories/{story_id}"))),
            )
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match (status, error_body) {
            (StatusCode::UNAUTHORIZED, _) => Err(ClientError::Unauthorized),
            (StatusCode::NOT_FOUND, Ok(api_error)) => Err(ClientError::NotFound(api_error.message)),
            (StatusCode::NOT_FOUND, Err(_)) => Err(ClientError::NotFound(format!("HTTP {status}"))),
            (_, Ok(api_error)) => Err(ClientError::Api {
                code: api_error.code,
                message: api_error.message,
                status: status.as_u16(),
            }),
            (_, Err(_)) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Delay between transform polls in milliseconds (default: 2000).
    pub poll_interval_ms: u64,
    /// Polls before `wait_for_transform` gives up (default: 60).
    pub max_transform_polls: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            poll_interval_ms: 2000,
            max_transform_polls: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = StorybookClient::new("http://localhost:8080/", "test-api-key").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
        assert_eq!(client.url("/health"), "http://localhost:8080/health");
    }

    #[test]
    fn default_options() {
        let options = ClientOptions::default();
        assert_eq!(options.timeout_seconds, 30);
        assert_eq!(options.max_transform_polls, 60);
    }
}
