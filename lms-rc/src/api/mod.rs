//! HTTP API handlers for lms-rc

pub mod auth;
pub mod error;
pub mod health;
pub mod reclassify;

pub use auth::auth_middleware;
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
pub use reclassify::trigger_reclassification;
