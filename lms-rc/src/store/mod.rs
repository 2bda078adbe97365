//! Storage collaborator for the reclassification migrator
//!
//! The migrator only talks to storage through [`ProgressStore`], so it can be
//! driven against SQLite in production and against wrapped or in-memory
//! stores in tests.

use async_trait::async_trait;
use lms_common::db::{
    Category, ProgressFilter, RecordId, TrainingDefinition, TrainingProgressRecord,
};
use thiserror::Error;

pub mod sqlite;

pub use sqlite::SqliteProgressStore;

/// Storage failure, split by whether the store is still reachable
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Connection-level failure; further calls will fail too
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A single statement failed; the store is still usable
    #[error("Storage operation failed: {0}")]
    Operation(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            StoreError::Unavailable(reason) | StoreError::Operation(reason) => reason,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
            other => StoreError::Operation(other.to_string()),
        }
    }
}

impl From<lms_common::Error> for StoreError {
    fn from(err: lms_common::Error) -> Self {
        match err {
            lms_common::Error::Database(db) => db.into(),
            lms_common::Error::Io(e) => StoreError::Unavailable(e.to_string()),
            other => StoreError::Operation(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Progress and definition storage
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// All progress records matching `filter`, in discovery order
    async fn find_progress(&self, filter: &ProgressFilter) -> StoreResult<Vec<TrainingProgressRecord>>;

    /// First progress record matching `filter`
    async fn find_one_progress(
        &self,
        filter: &ProgressFilter,
    ) -> StoreResult<Option<TrainingProgressRecord>>;

    /// Create `record` unless its (user, training, category) is already held
    ///
    /// Returns `false` when another record already occupies the slot.
    async fn insert_progress(&self, record: &TrainingProgressRecord) -> StoreResult<bool>;

    /// Delete one progress record; returns whether it existed
    async fn delete_progress(&self, id: &RecordId) -> StoreResult<bool>;

    /// Definition named `name` (case-insensitive) in `category`
    async fn find_definition(
        &self,
        name: &str,
        category: Category,
    ) -> StoreResult<Option<TrainingDefinition>>;

    /// Identifier for a newly created record
    fn next_id(&self) -> RecordId {
        RecordId::new()
    }
}
