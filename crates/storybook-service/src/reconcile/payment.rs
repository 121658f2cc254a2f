//! Payment webhook reconciliation.
//!
//! Applies verified Stripe events to the story record they correlate with:
//!
//! - `checkout.session.completed`: mark paid, then start generation once
//! - `checkout.session.async_payment_failed`: mark failed unless already paid
//! - `checkout.session.expired`: drop the pending story, never a paid one
//!
//! Every mutation is a single `update_record`, so duplicated or concurrent
//! deliveries for the same story serialize on the record version.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use storybook_core::{PaymentDetails, StoryId, TemplateId, UserId, UserStory};
use storybook_store::{Mutation, RecordKey, Store, StoreExt};

use crate::automation::{AutomationPlatform, StoryGenerationRequest};
use crate::crypto::{verify_stripe_signature, SignatureError};
use crate::error::ApiError;
use crate::stripe::{CheckoutSession, PaymentProvider, WebhookEvent};

/// Event kinds this reconciler acts on.
pub mod events {
    /// Payment captured.
    pub const SESSION_COMPLETED: &str = "checkout.session.completed";
    /// Delayed payment method failed.
    pub const SESSION_ASYNC_PAYMENT_FAILED: &str = "checkout.session.async_payment_failed";
    /// Session timed out unpaid.
    pub const SESSION_EXPIRED: &str = "checkout.session.expired";
}

/// Where correlation metadata was found.
///
/// Older sessions attached `{storyId, userId, templateId}` to the payment
/// intent only; newer ones attach it to the session. Sources are tried in
/// `CorrelationSource::PRIORITY` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationSource {
    /// `session.metadata`.
    SessionMetadata,
    /// Metadata of an expanded `session.payment_intent`.
    EmbeddedPaymentIntent,
    /// Metadata of `session.payment_intent` fetched from the provider.
    PaymentIntentLookup,
}

impl CorrelationSource {
    /// Lookup order.
    pub const PRIORITY: [Self; 3] = [
        Self::SessionMetadata,
        Self::EmbeddedPaymentIntent,
        Self::PaymentIntentLookup,
    ];
}

impl fmt::Display for CorrelationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SessionMetadata => "session_metadata",
            Self::EmbeddedPaymentIntent => "embedded_payment_intent",
            Self::PaymentIntentLookup => "payment_intent_lookup",
        })
    }
}

/// Story a payment event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    /// Story.
    pub story_id: StoryId,
    /// Owner.
    pub user_id: UserId,
    /// Template, when the metadata carries it.
    pub template_id: Option<TemplateId>,
    /// Where it came from.
    pub source: CorrelationSource,
}

impl Correlation {
    fn from_metadata(
        metadata: &std::collections::HashMap<String, String>,
        source: CorrelationSource,
    ) -> Option<Self> {
        let story_id = metadata.get("storyId").and_then(|v| StoryId::new(v.as_str()).ok())?;
        let user_id = metadata.get("userId").and_then(|v| UserId::new(v.as_str()).ok())?;
        let template_id = metadata
            .get("templateId")
            .and_then(|v| TemplateId::new(v.as_str()).ok());
        Some(Self {
            story_id,
            user_id,
            template_id,
            source,
        })
    }

    fn key(&self) -> RecordKey {
        RecordKey::user_story(&self.user_id, &self.story_id)
    }
}

/// What a delivery did, reported back to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// First confirmation; generation was requested.
    Confirmed {
        /// Whether the automation trigger accepted the job.
        generation_triggered: bool,
    },
    /// Repeated confirmation; fields rewritten, nothing triggered.
    AlreadyConfirmed,
    /// Payment failure recorded.
    MarkedFailed,
    /// Failure event for a story that is already paid.
    FailureIgnored,
    /// Pending story removed after expiry.
    ExpiredRemoved,
    /// Expiry for a story that no longer exists.
    ExpiredAbsent,
    /// Expiry for a paid story; kept and flagged.
    ExpiryIgnored,
    /// Event kind we do not act on.
    Ignored,
}

impl PaymentOutcome {
    /// Response message.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Confirmed {
                generation_triggered: true,
            } => "Payment confirmed and story generation started",
            Self::Confirmed {
                generation_triggered: false,
            } => "Payment confirmed; story generation could not be started",
            Self::AlreadyConfirmed => "Payment already confirmed",
            Self::MarkedFailed => "Payment failure recorded",
            Self::FailureIgnored => "Payment failure ignored for paid story",
            Self::ExpiredRemoved => "Checkout expired; pending story removed",
            Self::ExpiredAbsent => "Checkout expired; no pending story",
            Self::ExpiryIgnored => "Checkout expiry ignored for paid story",
            Self::Ignored => "Event ignored",
        }
    }
}

/// Applies payment provider events to user stories.
pub struct PaymentReconciler {
    store: Arc<dyn Store>,
    provider: Option<Arc<dyn PaymentProvider>>,
    automation: Arc<dyn AutomationPlatform>,
    webhook_secret: Option<String>,
}

impl PaymentReconciler {
    /// Create the reconciler.
    pub fn new(
        store: Arc<dyn Store>,
        provider: Option<Arc<dyn PaymentProvider>>,
        automation: Arc<dyn AutomationPlatform>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            store,
            provider,
            automation,
            webhook_secret,
        }
    }

    /// Verify a delivery's signature. Must pass before the body is parsed.
    pub fn verify(&self, payload: &str, signature: Option<&str>) -> Result<(), ApiError> {
        verify_stripe_signature(
            payload,
            signature,
            self.webhook_secret.as_deref(),
            Utc::now().timestamp(),
        )
        .map_err(|e| {
            tracing::warn!(error = %e, "Rejected payment webhook");
            match e {
                SignatureError::MissingSecret => {
                    ApiError::BadRequest("Webhook secret not configured".into())
                }
                SignatureError::MissingHeader => {
                    ApiError::BadRequest("Missing Stripe signature".into())
                }
                _ => ApiError::BadRequest("Invalid webhook signature".into()),
            }
        })
    }

    /// Apply a verified event.
    pub async fn handle(&self, event: &WebhookEvent) -> Result<PaymentOutcome, ApiError> {
        tracing::info!(
            event_type = %event.event_type,
            event_id = %event.id,
            "Received payment webhook"
        );

        match event.event_type.as_str() {
            events::SESSION_COMPLETED => {
                let session = Self::session(event)?;
                let correlation = self.require_correlation(&session).await?;
                self.confirm(event, &session, &correlation).await
            }
            events::SESSION_ASYNC_PAYMENT_FAILED => {
                let session = Self::session(event)?;
                let correlation = self.require_correlation(&session).await?;
                self.mark_failed(&correlation)
            }
            events::SESSION_EXPIRED => {
                let session = Self::session(event)?;
                match self.correlate(&session).await {
                    Some(correlation) => self.expire(&correlation),
                    None => {
                        tracing::info!(session_id = %session.id, "Expired session carries no story");
                        Ok(PaymentOutcome::ExpiredAbsent)
                    }
                }
            }
            other => {
                tracing::debug!(event_type = %other, "Unhandled payment event");
                Ok(PaymentOutcome::Ignored)
            }
        }
    }

    fn session(event: &WebhookEvent) -> Result<CheckoutSession, ApiError> {
        serde_json::from_value(event.data.object.clone())
            .map_err(|e| ApiError::BadRequest(format!("Invalid checkout session: {e}")))
    }

    /// Resolve correlation metadata, trying each source in priority order.
    pub async fn correlate(&self, session: &CheckoutSession) -> Option<Correlation> {
        for source in CorrelationSource::PRIORITY {
            let found = match source {
                CorrelationSource::SessionMetadata => {
                    Correlation::from_metadata(&session.metadata, source)
                }
                CorrelationSource::EmbeddedPaymentIntent => session
                    .payment_intent
                    .as_ref()
                    .and_then(|pi| pi.as_object())
                    .and_then(|pi| Correlation::from_metadata(&pi.metadata, source)),
                CorrelationSource::PaymentIntentLookup => {
                    self.lookup_payment_intent(session).await
                }
            };
            if let Some(correlation) = found {
                tracing::debug!(
                    session_id = %session.id,
                    source = %source,
                    story_id = %correlation.story_id,
                    "Resolved payment correlation"
                );
                return Some(correlation);
            }
        }
        None
    }

    async fn lookup_payment_intent(&self, session: &CheckoutSession) -> Option<Correlation> {
        let provider = self.provider.as_ref()?;
        let pi = session.payment_intent.as_ref()?;
        if pi.as_object().is_some() {
            // Already inspected as an embedded object.
            return None;
        }
        match provider.get_payment_intent(pi.id()).await {
            Ok(intent) => {
                Correlation::from_metadata(&intent.metadata, CorrelationSource::PaymentIntentLookup)
            }
            Err(e) => {
                tracing::warn!(
                    payment_intent = %pi.id(),
                    error = %e,
                    "Payment intent lookup failed"
                );
                None
            }
        }
    }

    async fn require_correlation(&self, session: &CheckoutSession) -> Result<Correlation, ApiError> {
        self.correlate(session).await.ok_or_else(|| {
            tracing::warn!(session_id = %session.id, "Payment event without story correlation");
            ApiError::BadRequest("Missing storyId or userId in metadata".into())
        })
    }

    async fn confirm(
        &self,
        event: &WebhookEvent,
        session: &CheckoutSession,
        correlation: &Correlation,
    ) -> Result<PaymentOutcome, ApiError> {
        let now = Utc::now();
        let paid_at = DateTime::from_timestamp(event.created, 0).unwrap_or(now);
        let details = PaymentDetails {
            amount: session.amount_total.unwrap_or_default(),
            currency: session.currency.clone().unwrap_or_default(),
            payment_reference: session
                .payment_intent
                .as_ref()
                .map_or_else(|| session.id.clone(), |pi| pi.id().to_string()),
            payer_email: session.payer_email(),
            paid_at,
        };

        let key = correlation.key();
        let updated = self
            .store
            .update_record::<UserStory, ApiError, _>(&key, |current| {
                let mut story = current.ok_or_else(|| {
                    ApiError::NotFound(format!("Story not found: {}", correlation.story_id))
                })?;
                if story.mark_payment_completed(details.clone(), Some(session.id.clone()), now) {
                    Ok(Mutation::Put(story))
                } else {
                    Ok(Mutation::Keep)
                }
            })?;

        let was_paid = updated.before.as_ref().is_some_and(UserStory::is_paid);
        let Some(story) = updated.after.filter(|_| !was_paid) else {
            tracing::info!(story_id = %correlation.story_id, "Duplicate payment confirmation");
            return Ok(PaymentOutcome::AlreadyConfirmed);
        };

        tracing::info!(
            story_id = %story.id,
            user_id = %story.user_id,
            amount = %details.amount,
            source = %correlation.source,
            "Payment confirmed"
        );

        let request = StoryGenerationRequest {
            story_id: story.id.clone(),
            user_id: story.user_id.clone(),
            template_id: correlation
                .template_id
                .clone()
                .unwrap_or_else(|| story.template_id.clone()),
            session_id: session.id.clone(),
            user_email: story.user_email.clone(),
            personalization: story.personalization.clone(),
        };

        // Payment truth is already durable; a trigger failure is only logged.
        let generation_triggered = match self.automation.trigger_story_generation(&request).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    story_id = %request.story_id,
                    error = %e,
                    "Story generation trigger failed"
                );
                false
            }
        };

        Ok(PaymentOutcome::Confirmed {
            generation_triggered,
        })
    }

    fn mark_failed(&self, correlation: &Correlation) -> Result<PaymentOutcome, ApiError> {
        let now = Utc::now();
        let updated = self
            .store
            .update_record::<UserStory, ApiError, _>(&correlation.key(), |current| {
                let mut story = current.ok_or_else(|| {
                    ApiError::NotFound(format!("Story not found: {}", correlation.story_id))
                })?;
                if story.mark_payment_failed("Payment failed", now) {
                    Ok(Mutation::Put(story))
                } else {
                    Ok(Mutation::Keep)
                }
            })?;

        if updated.after.as_ref().is_some_and(UserStory::is_paid) {
            tracing::warn!(story_id = %correlation.story_id, "Payment failure for paid story ignored");
            Ok(PaymentOutcome::FailureIgnored)
        } else {
            tracing::info!(story_id = %correlation.story_id, "Payment failure recorded");
            Ok(PaymentOutcome::MarkedFailed)
        }
    }

    fn expire(&self, correlation: &Correlation) -> Result<PaymentOutcome, ApiError> {
        let updated = self
            .store
            .update_record::<UserStory, ApiError, _>(&correlation.key(), |current| {
                Ok(match current {
                    Some(story) if !story.is_paid() => Mutation::Delete,
                    _ => Mutation::Keep,
                })
            })?;

        match updated.before {
            None => Ok(PaymentOutcome::ExpiredAbsent),
            Some(story) if story.is_paid() => {
                tracing::warn!(
                    story_id = %story.id,
                    user_id = %story.user_id,
                    "Checkout expiry delivered for a paid story; keeping record"
                );
                Ok(PaymentOutcome::ExpiryIgnored)
            }
            Some(story) => {
                tracing::info!(story_id = %story.id, "Removed pending story after checkout expiry");
                Ok(PaymentOutcome::ExpiredRemoved)
            }
        }
    }
}
