//! Stripe integration for hosted checkout.
//!
//! Stripe handles:
//! - Checkout sessions for story purchases
//! - Payment intent lookups when a session carries no metadata
//! - Signed webhook delivery (verified in `crate::crypto`)

pub mod client;
pub mod types;

use async_trait::async_trait;

pub use client::{StripeClient, StripeError};
pub use types::*;

/// The payment collaborator used by checkout and payment reconciliation.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError>;

    /// Fetch a payment intent by id.
    async fn get_payment_intent(&self, payment_intent_id: &str)
        -> Result<PaymentIntent, StripeError>;
}
