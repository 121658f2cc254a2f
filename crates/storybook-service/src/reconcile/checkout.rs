//! Checkout initiation.
//!
//! Writes the `creating`/`pending` story record, then asks the payment
//! provider for a hosted checkout session carrying the correlation metadata.
//! A provider failure deletes the record this call created. A story that is
//! already paid is never sent to checkout again.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use storybook_core::{ChildGender, Personalization, StoryId, TemplateId, UserId, UserStory};
use storybook_store::{RecordKey, Store, StoreError, StoreExt};

use crate::error::ApiError;
use crate::stripe::{CheckoutSessionRequest, PaymentProvider};

/// Checkout request from the web app.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Buyer.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Buyer email, prefilled on the checkout page.
    #[serde(default)]
    pub user_email: Option<String>,
    /// Template being personalized.
    #[serde(default)]
    pub template_id: Option<String>,
    /// Story id chosen by the caller; composed when absent.
    #[serde(default)]
    pub story_id: Option<String>,
    /// Child's name.
    #[serde(default)]
    pub child_name: Option<String>,
    /// Child's age.
    #[serde(default)]
    pub child_age: Option<String>,
    /// Child's gender.
    #[serde(default)]
    pub child_gender: Option<ChildGender>,
    /// Already-transformed photo.
    #[serde(default)]
    pub transformed_photo_url: Option<String>,
}

/// Checkout response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// Always `true`.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Hosted checkout page.
    pub checkout_url: String,
    /// Provider session id.
    pub session_id: String,
    /// Story the payment is for.
    pub story_id: StoryId,
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required field: {field}")))
}

/// Creates story records and checkout sessions.
pub struct CheckoutService {
    store: Arc<dyn Store>,
    provider: Option<Arc<dyn PaymentProvider>>,
    price_id: Option<String>,
    app_url: String,
}

impl CheckoutService {
    /// Create the service.
    pub fn new(
        store: Arc<dyn Store>,
        provider: Option<Arc<dyn PaymentProvider>>,
        price_id: Option<String>,
        app_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            provider,
            price_id,
            app_url: app_url.into(),
        }
    }

    /// Start a checkout for a personalized story.
    pub async fn create_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutResponse, ApiError> {
        let user_id = UserId::new(required(request.user_id, "userId")?)?;
        let user_email = required(request.user_email, "userEmail")?;
        let template_id = TemplateId::new(required(request.template_id, "templateId")?)?;

        let (Some(provider), Some(price_id)) = (&self.provider, &self.price_id) else {
            return Err(ApiError::Unavailable("Payments are not configured".into()));
        };

        let now = Utc::now();
        let story_id = match request.story_id.filter(|s| !s.trim().is_empty()) {
            Some(id) => StoryId::new(id)?,
            None => StoryId::compose(&template_id, &user_id, now.timestamp_millis()),
        };

        let key = RecordKey::user_story(&user_id, &story_id);
        let story = UserStory::new_pending(
            story_id.clone(),
            user_id.clone(),
            user_email.clone(),
            template_id.clone(),
            Personalization {
                child_name: request.child_name.unwrap_or_default(),
                child_age: request.child_age.unwrap_or_default(),
                child_gender: request.child_gender.unwrap_or_default(),
                transformed_photo_url: request.transformed_photo_url.unwrap_or_default(),
            },
            now,
        );

        let created = match self.store.create_record(&key, &story) {
            Ok(_) => true,
            Err(StoreError::Conflict { .. }) => {
                let existing = self.store.get_record::<UserStory>(&key)?;
                if existing.is_some_and(|record| record.value.is_paid()) {
                    tracing::warn!(key = %key, "Checkout requested for a story that is already paid");
                    return Err(ApiError::Conflict(format!("Story already paid: {story_id}")));
                }
                tracing::info!(key = %key, "Story record already exists, reusing it for checkout");
                false
            }
            Err(e) => return Err(e.into()),
        };

        let session_request = CheckoutSessionRequest {
            price_id: price_id.clone(),
            customer_email: user_email,
            client_reference_id: user_id.to_string(),
            success_url: format!(
                "{}/my-stories?session_id={{CHECKOUT_SESSION_ID}}&payment_success=true",
                self.app_url
            ),
            cancel_url: format!("{}/dashboard?payment_cancelled=true", self.app_url),
            metadata: vec![
                ("storyId".into(), story_id.to_string()),
                ("userId".into(), user_id.to_string()),
                ("templateId".into(), template_id.to_string()),
            ],
        };

        let failure = match provider.create_checkout_session(&session_request).await {
            Ok(session) => match session.url {
                Some(url) => {
                    tracing::info!(
                        story_id = %story_id,
                        user_id = %user_id,
                        session_id = %session.id,
                        "Checkout session created"
                    );
                    return Ok(CheckoutResponse {
                        success: true,
                        message: "Checkout session created".into(),
                        checkout_url: url,
                        session_id: session.id,
                        story_id,
                    });
                }
                None => "checkout session has no URL".to_string(),
            },
            Err(e) => e.provider_message(),
        };

        tracing::warn!(story_id = %story_id, error = %failure, "Checkout session creation failed");
        if created {
            if let Err(e) = self.store.delete(&key) {
                tracing::error!(key = %key, error = %e, "Failed to roll back story record");
            }
        }

        Err(ApiError::ExternalService(format!(
            "Failed to create checkout session: {failure}"
        )))
    }
}
