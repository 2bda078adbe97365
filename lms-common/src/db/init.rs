//! Database initialization
//!
//! Creates the database on first run and brings the schema of an existing
//! database up to date. Every step is idempotent.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Limited to a single connection: every SQLite in-memory connection is its
/// own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Apply pragmas, create tables and run pending migrations on an open pool
///
/// Split out of [`init_database`] so in-memory pools can be prepared the
/// same way.
pub async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    // WAL
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(pool)
        .await?;

    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_training_definitions_table(pool).await?;
    create_training_progress_table(pool).await?;

    // Uniqueness indexes are created by migration v1 so that databases
    // holding duplicate rows are cleaned up first
    crate::db::migrations::run_migrations(pool).await?;

    Ok(())
}

pub async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the training_definitions table
///
/// One row per (training name, category). Names compare case-insensitively.
pub async fn create_training_definitions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS training_definitions (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL COLLATE NOCASE,
            category TEXT NOT NULL CHECK (category IN ('Assigned', 'Mandatory')),
            description TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (name, category)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the training_progress table
///
/// A row identifies its training either by name or by definition reference,
/// never both.
pub async fn create_training_progress_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS training_progress (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            training_name TEXT COLLATE NOCASE,
            training_ref TEXT REFERENCES training_definitions(guid),
            category TEXT NOT NULL CHECK (category IN ('Assigned', 'Mandatory')),
            status TEXT NOT NULL DEFAULT 'Not Started',
            progress REAL NOT NULL DEFAULT 0,
            score REAL,
            completed_date TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK ((training_name IS NULL) <> (training_ref IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_progress_name_category ON training_progress(training_name, category, status)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_progress_ref_category ON training_progress(training_ref, category, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_schema_is_idempotent() {
        let pool = init_memory_database()
            .await
            .expect("Failed to create in-memory database");

        // Second pass over an existing schema must be a no-op
        prepare_schema(&pool).await.expect("second prepare");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert!(tables.contains(&"training_definitions".to_string()));
        assert!(tables.contains(&"training_progress".to_string()));
        assert!(tables.contains(&"settings".to_string()));
    }

    #[tokio::test]
    async fn test_progress_row_requires_exactly_one_training_key() {
        let pool = init_memory_database().await.unwrap();

        let neither = sqlx::query(
            "INSERT INTO training_progress (guid, user_id, category) VALUES ('a', 'u1', 'Assigned')",
        )
        .execute(&pool)
        .await;
        assert!(neither.is_err(), "row without any training key must be rejected");

        let bad_category = sqlx::query(
            "INSERT INTO training_progress (guid, user_id, training_name, category) VALUES ('b', 'u1', 'X', 'Optional')",
        )
        .execute(&pool)
        .await;
        assert!(bad_category.is_err(), "unknown category must be rejected");
    }
}
