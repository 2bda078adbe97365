//! Authentication middleware for lms-rc
//!
//! Validates `Authorization: Bearer <JWT>` on protected routes. Validated
//! claims are stored in request extensions for handlers.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use lms_common::api::{extract_bearer, validate_token};
use tracing::warn;

use super::error::ApiError;
use crate::AppState;

/// Authentication middleware
///
/// Returns 401 when the token is missing, malformed, expired or signed with
/// another secret. Applied to protected routes only; `/health` does not use
/// it.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(secret) = state.api_secret.as_deref() else {
        // No secret configured: authentication disabled
        return Ok(next.run(request).await);
    };

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default());

    let claims = extract_bearer(header)
        .and_then(|token| validate_token(token, secret))
        .map_err(|e| {
            warn!("Rejected {} {}: {}", request.method(), request.uri().path(), e);
            ApiError::Unauthorized(e.to_string())
        })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
