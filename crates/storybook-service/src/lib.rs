//! Storybook webhook service.
//!
//! This crate provides the HTTP service that reconciles a personalized
//! storybook purchase across three parties:
//!
//! - Hosted checkout and signed payment webhooks (Stripe)
//! - Photo transform and story generation jobs on the automation platform
//! - The story template catalog and its weekly favorite
//!
//! # Authentication
//!
//! Payment webhooks are authenticated by the provider's signature header.
//! Automation callbacks and the `/v1` user endpoints require the shared key in
//! `x-api-key`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Axum handlers must be async

pub mod auth;
pub mod automation;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod reconcile;
pub mod routes;
pub mod state;
pub mod stripe;

pub use automation::{AutomationClient, AutomationError, AutomationPlatform};
pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{PaymentProvider, StripeClient, StripeError};
