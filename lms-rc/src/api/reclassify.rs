//! Reclassification trigger endpoint

use axum::{extract::State, Extension, Json};
use lms_common::api::Claims;
use serde::Serialize;
use tracing::{error, info};

use super::error::{ApiError, ApiResult};
use crate::reclassify::{MigrationReport, Migrator};
use crate::store::SqliteProgressStore;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ReclassifyResponse {
    pub message: String,
    pub reports: Vec<MigrationReport>,
}

/// POST /api/reclassify
///
/// Runs the configured plans. No request body.
pub async fn trigger_reclassification(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
) -> ApiResult<Json<ReclassifyResponse>> {
    let _guard = state
        .run_lock
        .try_lock()
        .map_err(|_| ApiError::Conflict("A reclassification is already running".to_string()))?;

    let requested_by = claims
        .map(|Extension(c)| c.sub)
        .unwrap_or_else(|| "anonymous".to_string());
    info!(
        "Reclassification requested by {} ({} plan(s))",
        requested_by,
        state.plans.len()
    );

    let migrator = Migrator::new(SqliteProgressStore::new(state.db.clone()));
    let reports = migrator.migrate_all(&state.plans).await.map_err(|e| {
        error!("Reclassification failed: {}", e);
        ApiError::from(e)
    })?;

    let moved: usize = reports.iter().map(|r| r.moved).sum();
    let failed: usize = reports.iter().map(|r| r.failed.len()).sum();
    let message = if failed == 0 {
        format!("Reclassification complete: {} record(s) moved", moved)
    } else {
        format!(
            "Reclassification complete: {} record(s) moved, {} failed",
            moved, failed
        )
    };

    Ok(Json(ReclassifyResponse { message, reports }))
}
