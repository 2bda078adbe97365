//! Training reclassification
//!
//! Moves users' completed progress records for one training from a source
//! category to a target category. A user never ends up with two records for
//! the same (training, category): an existing target record wins unless the
//! plan asks to replace it, and the source record is removed either way.

use std::path::Path;

use lms_common::db::init_database;
use lms_common::Category;
use thiserror::Error;
use tracing::info;

pub mod migrator;
pub mod plan;
pub mod report;

pub use migrator::Migrator;
pub use plan::{
    CompletedDatePolicy, ConflictPolicy, MatchKey, MigrationPlan, MissingTargetPolicy,
    DEFAULT_TRAINING,
};
pub use report::{FailureStage, MigrationReport, RecordFailure};

use crate::store::SqliteProgressStore;

/// Run-level migration failure
///
/// Failures of individual records are not errors; they are listed in
/// [`MigrationReport::failed`].
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Plan cannot be run; nothing was read or written
    #[error("Invalid migration plan: {0}")]
    InvalidPlan(String),

    /// A required training definition does not exist; nothing was written
    #[error("No {category} training definition named '{name}'")]
    DefinitionNotFound { name: String, category: Category },

    /// Storage became unreachable; records already migrated stay migrated
    #[error("Storage unavailable: {reason}")]
    StorageUnavailable {
        reason: String,
        partial: Option<Box<MigrationReport>>,
    },

    /// A read needed to plan the run failed while storage stayed reachable
    #[error("Storage operation failed: {reason}")]
    StorageOperation {
        reason: String,
        partial: Option<Box<MigrationReport>>,
    },
}

impl MigrationError {
    /// Report of the records handled before the run stopped, if any
    pub fn partial(&self) -> Option<&MigrationReport> {
        match self {
            MigrationError::StorageUnavailable { partial, .. }
            | MigrationError::StorageOperation { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }
}

/// Open the database at `database_path`, run `plans`, close the pool
///
/// The pool is closed before returning on success and on failure alike.
pub async fn run_plans(
    database_path: &Path,
    plans: &[MigrationPlan],
) -> Result<Vec<MigrationReport>, MigrationError> {
    info!("Opening database: {}", database_path.display());
    let pool = init_database(database_path)
        .await
        .map_err(|e| MigrationError::StorageUnavailable {
            reason: e.to_string(),
            partial: None,
        })?;

    let migrator = Migrator::new(SqliteProgressStore::new(pool.clone()));
    let result = migrator.migrate_all(plans).await;

    pool.close().await;
    info!("Database closed");

    result
}
