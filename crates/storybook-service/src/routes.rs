//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{catalog, checkout, health, payments, stories, templates, transforms};
use crate::state::AppState;

/// Maximum concurrent requests for `/v1` endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `POST /api/create-checkout-session` - Start a story purchase
///
/// ## Webhooks
/// - `POST /api/payment-webhook` - Payment events (provider signature)
/// - `POST /api/photo-transform-webhook` - Transform lifecycle events (API key)
/// - `POST /api/photo-transform-status` - Transform result poll (API key)
/// - `POST /api/story-webhook` - Story generation callback (API key)
/// - `POST /api/webhook` - Catalog actions (API key)
///
/// ## API v1 (rate limited)
/// - `POST /v1/transformations` - Start a photo transform (API key)
/// - `GET /v1/users/:user_id/stories` - List stories (API key)
/// - `GET /v1/users/:user_id/stories/events` - Story change stream (API key)
/// - `GET /v1/users/:user_id/stories/:story_id` - One story (API key)
/// - `GET /v1/templates` - Catalog cards
/// - `GET /v1/templates/weekly-favorite` - Current weekly favorite
/// - `GET /v1/templates/:id/details` - Reader content
///
/// Webhook routes only accept `POST`; other methods get 405.
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/transformations", post(transforms::begin_transform))
        .route("/users/:user_id/stories", get(stories::list_stories))
        .route("/users/:user_id/stories/events", get(stories::story_events))
        .route("/users/:user_id/stories/:story_id", get(stories::get_story))
        .route("/templates", get(templates::list_templates))
        .route("/templates/weekly-favorite", get(templates::weekly_favorite))
        .route("/templates/:id/details", get(templates::template_details))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    let webhook_routes = Router::new()
        .route("/create-checkout-session", post(checkout::create_checkout_session))
        .route("/payment-webhook", post(payments::payment_webhook))
        .route("/photo-transform-webhook", post(transforms::transform_webhook))
        .route("/photo-transform-status", post(transforms::transform_status))
        .route("/story-webhook", post(stories::story_webhook))
        .route("/webhook", post(catalog::catalog_webhook));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", webhook_routes)
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
