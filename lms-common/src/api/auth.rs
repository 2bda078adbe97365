//! Bearer token authentication
//!
//! Requests carry `Authorization: Bearer <JWT>`. Tokens are HS256-signed with
//! the shared API secret and must carry an `exp` claim. When no secret is
//! configured, services skip validation entirely.
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions and database operations.
//! No HTTP framework dependencies (Axum, etc.) - those are in service code.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "sqlx")]
use sqlx::SqlitePool;

/// Settings key holding the API secret when none is configured
pub const API_SECRET_SETTING: &str = "api_jwt_secret";

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiAuthError {
    /// No Authorization header
    #[error("Missing bearer token")]
    MissingToken,

    /// Authorization header present but not `Bearer <token>`
    #[error("Malformed Authorization header")]
    MalformedHeader,

    /// Token `exp` is in the past
    #[error("Token expired")]
    Expired,

    /// Signature, algorithm or claims rejected
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token could not be produced
    #[error("Token encoding failed: {0}")]
    Encoding(String),

    /// Database error loading the secret
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Claims carried by LMS bearer tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Expiry, seconds since Unix epoch
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

// ========================================
// Secret Management
// ========================================

/// Load the API secret from the settings table
///
/// Returns `None` when the key is missing or empty; callers treat that as
/// authentication disabled.
#[cfg(feature = "sqlx")]
pub async fn load_api_secret(db: &SqlitePool) -> Result<Option<String>, ApiAuthError> {
    let result: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(API_SECRET_SETTING)
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(result
        .and_then(|(value,)| value)
        .filter(|v| !v.trim().is_empty()))
}

// ========================================
// Token Handling
// ========================================

/// Extract the token from an `Authorization` header value
///
/// # Examples
///
/// ```
/// use lms_common::api::auth::extract_bearer;
///
/// assert_eq!(extract_bearer(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
/// assert!(extract_bearer(Some("Basic dXNlcg==")).is_err());
/// assert!(extract_bearer(None).is_err());
/// ```
pub fn extract_bearer(header: Option<&str>) -> Result<&str, ApiAuthError> {
    let header = header.ok_or(ApiAuthError::MissingToken)?;
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(ApiAuthError::MalformedHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiAuthError::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiAuthError::MalformedHeader);
    }

    Ok(token)
}

/// Validate an HS256 token against `secret` and return its claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, ApiAuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ApiAuthError::Expired,
            _ => ApiAuthError::InvalidToken(e.to_string()),
        })
}

/// Issue an HS256 token for `subject`, valid for `ttl`
///
/// Any holder of the shared secret can mint tokens the trigger accepts; the
/// LMS issues them the same way.
pub fn issue_token(
    subject: &str,
    role: Option<&str>,
    secret: &str,
    ttl: Duration,
) -> Result<String, ApiAuthError> {
    let claims = Claims {
        sub: subject.to_string(),
        exp: (Utc::now() + ttl).timestamp(),
        role: role.map(str::to_string),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiAuthError::Encoding(e.to_string()))
}

// ========================================
// Tests
// ========================================
