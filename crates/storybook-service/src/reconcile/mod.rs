//! Reconciliation services.
//!
//! Each service owns one external interaction and applies it to the record
//! store with atomic read-merge-write updates:
//!
//! - `CheckoutService`: creates pending stories and hosted checkout sessions
//! - `PaymentReconciler`: applies payment provider events
//! - `TransformCoordinator`: tracks photo transform jobs
//! - `StoryCompletion`: merges generated story content
//! - `CatalogService` and `CatalogCache`: maintain and serve the template catalog

pub mod catalog;
pub mod catalog_cache;
pub mod checkout;
pub mod payment;
pub mod story;
pub mod transform;

pub use catalog::{CatalogAction, CatalogOutcome, CatalogRequest, CatalogService, TemplatePayload};
pub use catalog_cache::CatalogCache;
pub use checkout::{CheckoutRequest, CheckoutResponse, CheckoutService};
pub use payment::{Correlation, CorrelationSource, PaymentOutcome, PaymentReconciler};
pub use story::{StoryCompletion, StoryWebhook};
pub use transform::{
    TransformCoordinator, TransformEvent, TransformEventKind, TransformStatusRequest,
    TransformStatusResponse,
};
