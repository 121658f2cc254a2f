//! Stripe API types.

use std::collections::HashMap;

use serde::Deserialize;

/// A Stripe field that is either an id or the expanded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    /// Object id only.
    Id(String),
    /// Expanded object.
    Object(Box<T>),
}

impl<T> Expandable<T> {
    /// The expanded object, if present.
    #[must_use]
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Self::Object(obj) => Some(obj.as_ref()),
            Self::Id(_) => None,
        }
    }
}

impl Expandable<PaymentIntent> {
    /// The object id, expanded or not.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object(obj) => &obj.id,
        }
    }
}

/// Customer details captured by Checkout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    /// Email entered at checkout.
    #[serde(default)]
    pub email: Option<String>,
}

/// Stripe Checkout session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// Payment status.
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Total amount in the smallest currency unit.
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// Currency (e.g., "usd").
    #[serde(default)]
    pub currency: Option<String>,
    /// Client reference ID (our `userId`).
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Email the session was created with.
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Details the customer entered.
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    /// Payment intent, as an id or expanded.
    #[serde(default)]
    pub payment_intent: Option<Expandable<PaymentIntent>>,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// Best known payer email.
    #[must_use]
    pub fn payer_email(&self) -> Option<String> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.clone())
            .or_else(|| self.customer_email.clone())
    }
}

/// Stripe `PaymentIntent` object.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    /// Payment intent ID.
    pub id: String,
    /// Amount in the smallest currency unit.
    #[serde(default)]
    pub amount: i64,
    /// Currency (e.g., "usd").
    #[serde(default)]
    pub currency: String,
    /// Status (succeeded, processing, ...).
    #[serde(default)]
    pub status: String,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Receipt email.
    #[serde(default)]
    pub receipt_email: Option<String>,
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Parameters for a one-item Checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    /// Price charged.
    pub price_id: String,
    /// Prefilled customer email.
    pub customer_email: String,
    /// Our user id.
    pub client_reference_id: String,
    /// Redirect after payment.
    pub success_url: String,
    /// Redirect after cancel.
    pub cancel_url: String,
    /// Correlation metadata, copied to the session and its payment intent.
    pub metadata: Vec<(String, String)>,
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}
