//! API key authentication extractor.
//!
//! Protected routes expect the shared automation key in `X-API-Key`. The key
//! is compared in constant time over SHA-256 digests. When the server has no
//! key configured, every protected request is rejected.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use legacymark_infra::signature::keys_match;
use secrecy::ExposeSecret;

use crate::http::error::AppError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Authenticated request marker. Extracting this validates the API key.
pub struct Authenticated;

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.api_key.as_deref() else {
            tracing::warn!(path = %parts.uri.path(), "rejecting request: no automation API key configured");
            return Err(unauthorized());
        };

        let provided = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();

        if provided.is_empty() || !keys_match(expected.expose_secret(), provided) {
            tracing::warn!(path = %parts.uri.path(), "rejecting request: invalid API key");
            return Err(unauthorized());
        }

        Ok(Authenticated)
    }
}

fn unauthorized() -> AppError {
    AppError::Unauthorized("Unauthorized".to_string())
}
