//! Database schema migrations
//!
//! Versioned schema migrations so existing databases are upgraded in place.
//! Applied versions are tracked in the `schema_version` table and every
//! migration is safe to run more than once.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field already ran them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Document data loss** - if a migration cannot preserve rows, say which ones go

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

/// Set schema version in database
async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: One progress row per (user, training, category)
///
/// **Background:** Progress rows were written without a uniqueness guard, so
/// a user could hold two rows for the same training in the same category.
/// This migration deletes the later duplicates (keeping the first-inserted
/// row of each group) and then adds the unique indexes that make inserts
/// conflict instead of duplicating.
///
/// **Data loss:** duplicate rows other than the first-inserted one are deleted.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: Unique progress rows per user, training and category");

    let mut tx = pool.begin().await?;

    // GROUP BY honours the NOCASE collation of training_name
    let by_name = sqlx::query(
        r#"
        DELETE FROM training_progress
        WHERE training_name IS NOT NULL
          AND rowid NOT IN (
            SELECT MIN(rowid) FROM training_progress
            WHERE training_name IS NOT NULL
            GROUP BY user_id, training_name, category
          )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    let by_ref = sqlx::query(
        r#"
        DELETE FROM training_progress
        WHERE training_ref IS NOT NULL
          AND rowid NOT IN (
            SELECT MIN(rowid) FROM training_progress
            WHERE training_ref IS NOT NULL
            GROUP BY user_id, training_ref, category
          )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    let removed = by_name.rows_affected() + by_ref.rows_affected();
    if removed > 0 {
        warn!("  Removed {} duplicate progress rows", removed);
    }

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_progress_unique_name
        ON training_progress(user_id, training_name, category)
        WHERE training_name IS NOT NULL
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_progress_unique_ref
        ON training_progress(user_id, training_ref, category)
        WHERE training_ref IS NOT NULL
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("  ✓ Added unique progress indexes");
    Ok(())
}
