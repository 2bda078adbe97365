//! API module for shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Database operations (via sqlx)
//! - Shared types
//!
//! Each service wraps these with framework-specific middleware (Axum, etc.).

pub mod auth;

#[cfg(feature = "sqlx")]
pub use auth::load_api_secret;
pub use auth::{extract_bearer, issue_token, validate_token, ApiAuthError, Claims};
