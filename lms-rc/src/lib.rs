//! lms-rc library - training reclassification
//!
//! Moves completed training progress between the Assigned and Mandatory
//! categories without leaving duplicate records behind. Runs one-shot from
//! the command line or on demand behind a bearer-token protected endpoint.

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod reclassify;
pub mod store;

use reclassify::MigrationPlan;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// HS256 secret for bearer tokens; `None` disables authentication
    pub api_secret: Option<String>,
    /// Plans run by each trigger
    pub plans: Arc<Vec<MigrationPlan>>,
    /// Held while a migration runs; one run at a time
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, api_secret: Option<String>, plans: Vec<MigrationPlan>) -> Self {
        Self {
            db,
            api_secret,
            plans: Arc::new(plans),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Build application router
///
/// `/health` is public; everything under `/api` requires a bearer token
/// when a secret is configured.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::post;

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/reclassify", post(api::trigger_reclassification))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
