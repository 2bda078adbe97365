//! Training definition and progress row access
//!
//! Row-level queries over `training_definitions` and `training_progress`.
//! Name comparisons rely on the NOCASE collation declared on the columns.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::models::{
    Category, ProgressStatus, RecordId, TrainingDefinition, TrainingKey, TrainingProgressRecord,
};
use crate::{Error, Result};

/// Equality filter over progress rows
///
/// Unset fields do not constrain the match. Training keys are alternatives:
/// a row matches when its key equals any of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressFilter {
    pub user_id: Option<String>,
    pub trainings: Vec<TrainingKey>,
    pub category: Option<Category>,
    pub status: Option<ProgressStatus>,
}

impl ProgressFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Add `training` as an accepted key
    pub fn training(mut self, training: TrainingKey) -> Self {
        self.trainings.push(training);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn status(mut self, status: ProgressStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether `record` satisfies every set field
    pub fn matches(&self, record: &TrainingProgressRecord) -> bool {
        self.user_id.as_ref().map_or(true, |u| *u == record.user_id)
            && (self.trainings.is_empty()
                || self
                    .trainings
                    .iter()
                    .any(|t| t.same_training(&record.training)))
            && self.category.map_or(true, |c| c == record.category)
            && self.status.map_or(true, |s| s == record.status)
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE 1 = 1");

        if let Some(user_id) = &self.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if !self.trainings.is_empty() {
            builder.push(" AND (");
            for (i, training) in self.trainings.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                match training {
                    TrainingKey::Name(name) => {
                        builder.push("training_name = ").push_bind(name.clone());
                    }
                    TrainingKey::Reference(id) => {
                        builder.push("training_ref = ").push_bind(id.to_string());
                    }
                }
            }
            builder.push(")");
        }
        if let Some(category) = self.category {
            builder.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(status) = self.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
    }
}

const PROGRESS_COLUMNS: &str = "guid, user_id, training_name, training_ref, category, status, \
                                progress, score, completed_date";

/// Find progress rows matching `filter`, in insertion order
pub async fn find_progress(
    pool: &SqlitePool,
    filter: &ProgressFilter,
) -> Result<Vec<TrainingProgressRecord>> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM training_progress",
        PROGRESS_COLUMNS
    ));
    filter.push_where(&mut builder);
    builder.push(" ORDER BY rowid");

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(progress_from_row).collect()
}

/// Find the first progress row matching `filter`
pub async fn find_one_progress(
    pool: &SqlitePool,
    filter: &ProgressFilter,
) -> Result<Option<TrainingProgressRecord>> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM training_progress",
        PROGRESS_COLUMNS
    ));
    filter.push_where(&mut builder);
    builder.push(" ORDER BY rowid LIMIT 1");

    let row = builder.build().fetch_optional(pool).await?;
    row.as_ref().map(progress_from_row).transpose()
}

/// Insert a progress row unless one already exists for its
/// (user, training, category)
///
/// Returns `false` when the unique index already holds a row. The check and
/// the write are a single statement, so concurrent writers cannot both
/// succeed.
pub async fn insert_progress_if_absent(
    pool: &SqlitePool,
    record: &TrainingProgressRecord,
) -> Result<bool> {
    let (training_name, training_ref) = split_key(&record.training);

    let result = sqlx::query(
        r#"
        INSERT INTO training_progress (
            guid, user_id, training_name, training_ref, category, status,
            progress, score, completed_date, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(record.id.to_string())
    .bind(&record.user_id)
    .bind(training_name)
    .bind(training_ref)
    .bind(record.category.as_str())
    .bind(record.status.as_str())
    .bind(record.progress)
    .bind(record.score)
    .bind(record.completed_date)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete a progress row by id; returns whether a row was removed
pub async fn delete_progress(pool: &SqlitePool, id: &RecordId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM training_progress WHERE guid = ?")
        .bind(id.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Save a training definition (insert or update by id)
pub async fn save_definition(pool: &SqlitePool, definition: &TrainingDefinition) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO training_definitions (guid, name, category, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(guid) DO UPDATE SET
            name = excluded.name,
            category = excluded.category,
            description = excluded.description,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(definition.id.to_string())
    .bind(&definition.name)
    .bind(definition.category.as_str())
    .bind(&definition.description)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the definition for `name` (case-insensitive) in `category`
pub async fn find_definition(
    pool: &SqlitePool,
    name: &str,
    category: Category,
) -> Result<Option<TrainingDefinition>> {
    let row = sqlx::query(
        r#"
        SELECT guid, name, category, description
        FROM training_definitions
        WHERE name = ? AND category = ?
        "#,
    )
    .bind(name)
    .bind(category.as_str())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let guid: String = row.get("guid");
            let category: String = row.get("category");

            Ok(Some(TrainingDefinition {
                id: guid.parse()?,
                name: row.get("name"),
                category: category.parse()?,
                description: row.get("description"),
            }))
        }
        None => Ok(None),
    }
}

fn split_key(key: &TrainingKey) -> (Option<String>, Option<String>) {
    match key {
        TrainingKey::Name(name) => (Some(name.clone()), None),
        TrainingKey::Reference(id) => (None, Some(id.to_string())),
    }
}

fn progress_from_row(row: &SqliteRow) -> Result<TrainingProgressRecord> {
    let guid: String = row.try_get("guid")?;
    let training_name: Option<String> = row.try_get("training_name")?;
    let training_ref: Option<String> = row.try_get("training_ref")?;
    let category: String = row.try_get("category")?;
    let status: String = row.try_get("status")?;

    let training = match (training_name, training_ref) {
        (Some(name), None) => TrainingKey::Name(name),
        (None, Some(reference)) => TrainingKey::Reference(reference.parse()?),
        _ => {
            return Err(Error::InvalidInput(format!(
                "Progress row {} must carry exactly one of training_name, training_ref",
                guid
            )))
        }
    };

    let completed_date: Option<DateTime<Utc>> = row.try_get("completed_date")?;

    Ok(TrainingProgressRecord {
        id: guid.parse()?,
        user_id: row.try_get("user_id")?,
        training,
        category: category.parse()?,
        status: status.parse()?,
        progress: row.try_get("progress")?,
        score: row.try_get("score")?,
        completed_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;
    use chrono::TimeZone;

    fn completed(user: &str, name: &str, category: Category, score: f64) -> TrainingProgressRecord {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        TrainingProgressRecord::new(user, TrainingKey::Name(name.to_string()), category)
            .completed(Some(score), at)
    }

    #[tokio::test]
    async fn test_insert_and_find_by_case_insensitive_name() {
        let pool = init_memory_database().await.unwrap();
        let record = completed("u1", "Foundation of Service", Category::Assigned, 95.0);

        assert!(insert_progress_if_absent(&pool, &record).await.unwrap());

        let filter = ProgressFilter::new()
            .training(TrainingKey::Name("foundation of service".to_string()))
            .category(Category::Assigned)
            .status(ProgressStatus::Completed);
        let found = find_progress(&pool, &filter).await.unwrap();

        assert_eq!(found, vec![record]);
    }

    #[tokio::test]
    async fn test_insert_if_absent_reports_conflict() {
        let pool = init_memory_database().await.unwrap();
        let first = completed("u1", "Safety Basics", Category::Mandatory, 90.0);
        let second = completed("u1", "SAFETY BASICS", Category::Mandatory, 10.0);

        assert!(insert_progress_if_absent(&pool, &first).await.unwrap());
        assert!(!insert_progress_if_absent(&pool, &second).await.unwrap());

        let kept = find_one_progress(&pool, &ProgressFilter::new().user("u1"))
            .await
            .unwrap()
            .expect("row should exist");
        assert_eq!(kept.score, Some(90.0));
    }

    #[tokio::test]
    async fn test_delete_progress_by_id() {
        let pool = init_memory_database().await.unwrap();
        let record = completed("u2", "Safety Basics", Category::Assigned, 50.0);
        insert_progress_if_absent(&pool, &record).await.unwrap();

        assert!(delete_progress(&pool, &record.id).await.unwrap());
        assert!(!delete_progress(&pool, &record.id).await.unwrap());
        assert!(find_progress(&pool, &ProgressFilter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_definition_per_category() {
        let pool = init_memory_database().await.unwrap();
        let assigned = TrainingDefinition::new("Foundation of Service", Category::Assigned);
        let mandatory = TrainingDefinition::new("Foundation of Service", Category::Mandatory);
        save_definition(&pool, &assigned).await.unwrap();
        save_definition(&pool, &mandatory).await.unwrap();

        let found = find_definition(&pool, "FOUNDATION OF SERVICE", Category::Mandatory)
            .await
            .unwrap()
            .expect("definition should resolve");
        assert_eq!(found.id, mandatory.id);

        assert!(find_definition(&pool, "Unknown", Category::Assigned)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_filter_matches_in_memory() {
        let record = completed("u1", "Foundation of Service", Category::Assigned, 95.0);

        assert!(ProgressFilter::new().matches(&record));
        assert!(ProgressFilter::new()
            .user("u1")
            .training(TrainingKey::Name("FOUNDATION of service".to_string()))
            .category(Category::Assigned)
            .status(ProgressStatus::Completed)
            .matches(&record));
        assert!(!ProgressFilter::new().category(Category::Mandatory).matches(&record));
        assert!(!ProgressFilter::new().user("u2").matches(&record));
    }

    #[tokio::test]
    async fn test_filter_accepts_any_listed_training() {
        let pool = init_memory_database().await.unwrap();
        let definition = TrainingDefinition::new("Foundation of Service", Category::Assigned);
        save_definition(&pool, &definition).await.unwrap();

        let by_name = completed("u1", "Foundation of Service", Category::Assigned, 95.0);
        let by_ref = TrainingProgressRecord::new(
            "u2",
            TrainingKey::Reference(definition.id.clone()),
            Category::Assigned,
        );
        let other = completed("u3", "Safety Basics", Category::Assigned, 70.0);
        for record in [&by_name, &by_ref, &other] {
            insert_progress_if_absent(&pool, record).await.unwrap();
        }

        let filter = ProgressFilter::new()
            .training(TrainingKey::Name("Foundation of Service".to_string()))
            .training(TrainingKey::Reference(definition.id.clone()))
            .category(Category::Assigned);
        let found = find_progress(&pool, &filter).await.unwrap();

        assert_eq!(found, vec![by_name.clone(), by_ref.clone()]);
        assert!(filter.matches(&by_name));
        assert!(filter.matches(&by_ref));
        assert!(!filter.matches(&other));
    }

    #[tokio::test]
    async fn test_legacy_row_id_is_readable() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query(
            "INSERT INTO training_progress (guid, user_id, training_name, category, status, progress)
             VALUES ('65f1c2a9e4b0a1b2c3d4e5f6', 'u1', 'Safety Basics', 'Assigned', 'Completed', 100)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let found = find_one_progress(&pool, &ProgressFilter::new().user("u1"))
            .await
            .unwrap()
            .expect("legacy row should load");
        assert_eq!(found.id.as_str(), "65f1c2a9e4b0a1b2c3d4e5f6");

        assert!(delete_progress(&pool, &found.id).await.unwrap());
    }
}
