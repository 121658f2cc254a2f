//! Shared API key authentication.
//!
//! The automation platform and the web app's server side present the
//! pre-shared key in the `x-api-key` header. The key is checked before the
//! body is read, so a rejected request never reaches the store.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the shared key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Proof that the request carried the configured shared key.
#[derive(Debug, Clone, Copy)]
pub struct ApiKeyAuth;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ApiKeyAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // An unset key rejects everything rather than accepting everything.
        let expected = state
            .config
            .automation_api_key
            .as_deref()
            .ok_or_else(|| {
                tracing::warn!("AUTOMATION_API_KEY not configured - rejecting request");
                ApiError::Unauthorized
            })?;

        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        if !constant_time_eq(presented, expected) {
            tracing::warn!(path = %parts.uri.path(), "Invalid API key");
            return Err(ApiError::Unauthorized);
        }

        Ok(ApiKeyAuth)
    }
}
