//! Database initialization
//!
//! Creates the metadata store on first run and applies the schema
//! idempotently on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// SQLite busy timeout applied to every pooled connection
pub const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open (creating if needed) the metadata store and apply the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Options apply per connection, so every pooled connection gets WAL,
    // foreign keys and the busy timeout (WAL lets status readers poll while
    // a validation run writes)
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Apply every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_cohort_table(pool).await?;
    create_wiki_user_table(pool).await?;
    create_cohort_wiki_user_table(pool).await?;
    Ok(())
}

async fn create_cohort_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cohort (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            default_project TEXT,
            enabled INTEGER NOT NULL DEFAULT 1,
            public INTEGER NOT NULL DEFAULT 0,
            validated INTEGER NOT NULL DEFAULT 0,
            validate_as_user_ids INTEGER NOT NULL DEFAULT 1,
            validation_queue_key TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Candidate identities awaiting (or holding) a validation verdict
///
/// `raw_username` and `project` keep the upload as given; `mediawiki_username`
/// and `resolved_project` hold what the last validation run made of them.
async fn create_wiki_user_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wiki_user (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            mediawiki_username TEXT NOT NULL,
            raw_username TEXT NOT NULL,
            mediawiki_userid INTEGER,
            project TEXT NOT NULL,
            resolved_project TEXT,
            valid INTEGER,
            reason_invalid TEXT,
            validating_cohort INTEGER NOT NULL REFERENCES cohort(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_wiki_user_validating_cohort ON wiki_user(validating_cohort)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_cohort_wiki_user_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cohort_wiki_user (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cohort_id INTEGER NOT NULL REFERENCES cohort(id) ON DELETE CASCADE,
            wiki_user_id INTEGER NOT NULL REFERENCES wiki_user(id) ON DELETE CASCADE,
            UNIQUE (cohort_id, wiki_user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
