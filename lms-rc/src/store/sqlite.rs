//! SQLite-backed progress store

use async_trait::async_trait;
use lms_common::db::training;
use lms_common::db::{
    Category, ProgressFilter, RecordId, TrainingDefinition, TrainingProgressRecord,
};
use sqlx::SqlitePool;

use super::{ProgressStore, StoreResult};

/// [`ProgressStore`] over a shared connection pool
///
/// The pool is owned by the caller; cloning the store shares it.
#[derive(Debug, Clone)]
pub struct SqliteProgressStore {
    pool: SqlitePool,
}

impl SqliteProgressStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn find_progress(&self, filter: &ProgressFilter) -> StoreResult<Vec<TrainingProgressRecord>> {
        Ok(training::find_progress(&self.pool, filter).await?)
    }

    async fn find_one_progress(
        &self,
        filter: &ProgressFilter,
    ) -> StoreResult<Option<TrainingProgressRecord>> {
        Ok(training::find_one_progress(&self.pool, filter).await?)
    }

    async fn insert_progress(&self, record: &TrainingProgressRecord) -> StoreResult<bool> {
        Ok(training::insert_progress_if_absent(&self.pool, record).await?)
    }

    async fn delete_progress(&self, id: &RecordId) -> StoreResult<bool> {
        Ok(training::delete_progress(&self.pool, id).await?)
    }

    async fn find_definition(
        &self,
        name: &str,
        category: Category,
    ) -> StoreResult<Option<TrainingDefinition>> {
        Ok(training::find_definition(&self.pool, name, category).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use lms_common::db::init_memory_database;
    use lms_common::TrainingKey;

    #[tokio::test]
    async fn test_closed_pool_reports_unavailable() {
        let pool = init_memory_database().await.unwrap();
        let store = SqliteProgressStore::new(pool.clone());
        pool.close().await;

        let err = store
            .find_progress(&ProgressFilter::new())
            .await
            .expect_err("closed pool must fail");
        assert!(matches!(err, StoreError::Unavailable(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_insert_then_delete_through_store() {
        let store = SqliteProgressStore::new(init_memory_database().await.unwrap());
        let record = TrainingProgressRecord::new(
            "u1",
            TrainingKey::Name("Foundation of Service".to_string()),
            Category::Mandatory,
        );

        assert!(store.insert_progress(&record).await.unwrap());
        let found = store
            .find_one_progress(&ProgressFilter::new().user("u1"))
            .await
            .unwrap();
        assert_eq!(found, Some(record.clone()));

        assert!(store.delete_progress(&record.id).await.unwrap());
        assert_ne!(store.next_id(), store.next_id());
    }
}
