//! Personalized story records.
//!
//! A `UserStory` is the per-user generation job. It is created in `creating`
//! with `paymentStatus = pending` by the checkout initiator and then advanced
//! by the payment and story-generation webhooks. Status and payment status are
//! independent axes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{StoryId, TemplateId, UserId};

/// Generation status of a user story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    /// Waiting for payment and/or generation.
    Creating,
    /// Generation output has been merged in.
    Completed,
}

/// Payment status of a user story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Checkout created, no confirmation yet.
    Pending,
    /// Provider confirmed the payment.
    Completed,
    /// Provider reported a failed payment.
    Failed,
}

/// Gender of the child the story is personalized for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildGender {
    /// Male.
    #[default]
    Male,
    /// Female.
    Female,
}

/// Personalization inputs captured at checkout. Immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Personalization {
    /// Child's name.
    #[serde(default)]
    pub child_name: String,
    /// Child's age, kept as entered.
    #[serde(default)]
    pub child_age: String,
    /// Child's gender.
    #[serde(default)]
    pub child_gender: ChildGender,
    /// URL of the already-transformed photo.
    #[serde(default)]
    pub transformed_photo_url: String,
}

/// Payment confirmation details recorded by the payment webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// Amount in minor units.
    pub amount: i64,
    /// ISO currency code, lowercase as the provider reports it.
    pub currency: String,
    /// Provider payment reference (payment intent id, or session id).
    pub payment_reference: String,
    /// Payer email, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_email: Option<String>,
    /// When the payment was confirmed.
    pub paid_at: DateTime<Utc>,
}

/// Generated book content delivered by the automation worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    /// Story title; stored as sent, even when blank.
    #[serde(default)]
    pub title: String,
    /// Story description.
    #[serde(default)]
    pub description: String,
    /// Preview thumbnail.
    #[serde(default, alias = "thumbnailURL")]
    pub thumbnail_url: String,
    /// One image per spread.
    #[serde(default, alias = "imageURLs")]
    pub image_urls: Vec<String>,
    /// Text per page.
    #[serde(default)]
    pub story_texts: Vec<String>,
    /// Narration audio per page.
    #[serde(default, alias = "narrationURLs")]
    pub narration_urls: Vec<String>,
    /// Page count (12 or 24 in the current catalog).
    #[serde(default)]
    pub number_of_pages: u32,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A personalized story generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStory {
    /// Story id (`{templateId}_{userId}_{epochMillis}`).
    pub id: StoryId,
    /// Owner.
    pub user_id: UserId,
    /// Owner email at checkout time.
    #[serde(default)]
    pub user_email: String,
    /// Template the story is based on.
    pub template_id: TemplateId,

    /// Personalization inputs.
    #[serde(flatten)]
    pub personalization: Personalization,

    /// Generation status.
    pub status: StoryStatus,
    /// Payment status.
    pub payment_status: PaymentStatus,
    /// Set once the provider confirms payment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_details: Option<PaymentDetails>,
    /// Set when the provider reports a failed payment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_error: Option<String>,
    /// Checkout session that paid for this story.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Generated title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Generated description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Generated thumbnail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Generated spread images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    /// Generated page texts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_texts: Option<Vec<String>>,
    /// Generated narration audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_urls: Option<Vec<String>>,
    /// Generated page count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_pages: Option<u32>,
    /// Generated tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Bumped on every mutation.
    pub updated_at: DateTime<Utc>,
}

impl UserStory {
    /// Create the initial `creating` / `pending` record written at checkout.
    #[must_use]
    pub fn new_pending(
        id: StoryId,
        user_id: UserId,
        user_email: impl Into<String>,
        template_id: TemplateId,
        personalization: Personalization,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            user_email: user_email.into(),
            template_id,
            personalization,
            status: StoryStatus::Creating,
            payment_status: PaymentStatus::Pending,
            payment_details: None,
            payment_error: None,
            session_id: None,
            title: None,
            description: None,
            thumbnail_url: None,
            image_urls: None,
            story_texts: None,
            narration_urls: None,
            number_of_pages: None,
            tags: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the provider has confirmed payment.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Completed
    }

    /// Record a confirmed payment.
    ///
    /// Returns `true` when this call moved the story into `completed` payment
    /// status. A story that is already paid is left untouched, so the first
    /// confirmation's details and session are kept.
    pub fn mark_payment_completed(
        &mut self,
        details: PaymentDetails,
        session_id: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.is_paid() {
            return false;
        }
        self.payment_status = PaymentStatus::Completed;
        self.payment_details = Some(details);
        self.payment_error = None;
        if session_id.is_some() {
            self.session_id = session_id;
        }
        self.updated_at = now;
        true
    }

    /// Record a failed payment. A story that is already paid is left alone.
    ///
    /// Returns `true` if the record changed.
    pub fn mark_payment_failed(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> bool {
        if self.is_paid() {
            return false;
        }
        self.payment_status = PaymentStatus::Failed;
        self.payment_error = Some(reason.into());
        self.updated_at = now;
        true
    }

    /// Merge generated book content and mark the story completed.
    pub fn apply_book_details(&mut self, book: &BookDetails, now: DateTime<Utc>) {
        self.status = StoryStatus::Completed;
        self.title = Some(book.title.clone());
        self.description = Some(book.description.clone());
        self.thumbnail_url = Some(book.thumbnail_url.clone());
        self.image_urls = Some(book.image_urls.clone());
        self.story_texts = Some(book.story_texts.clone());
        self.narration_urls = Some(book.narration_urls.clone());
        self.number_of_pages = Some(book.number_of_pages);
        self.tags = Some(book.tags.clone());
        self.updated_at = now;
    }
}
