//! Cohort rows: creation from an upload, lookup, status

use cohort_common::db::{Cohort, NewCohort, UploadRecord};
use cohort_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::utils::retry_on_lock;

/// Create a cohort and its unvalidated candidate rows in one transaction
///
/// A record with a blank project falls back to the cohort's default project.
/// The cohort starts with `validated = false`.
pub async fn create_cohort_from_upload(
    pool: &SqlitePool,
    cohort: &NewCohort,
    records: &[UploadRecord],
    max_lock_wait_ms: u64,
) -> Result<Cohort> {
    if cohort.name.trim().is_empty() {
        return Err(Error::InvalidInput("cohort name is empty".to_string()));
    }
    if records.is_empty() {
        return Err(Error::InvalidInput("upload contains no records".to_string()));
    }

    let default_project = cohort
        .default_project
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let mut rows = Vec::with_capacity(records.len());
    for (line, record) in records.iter().enumerate() {
        let project = match record.project.trim() {
            "" => default_project.ok_or_else(|| {
                Error::InvalidInput(format!(
                    "record {} has no project and the cohort has no default project",
                    line + 1
                ))
            })?,
            _ => record.project.as_str(),
        };
        rows.push((record.username.as_str(), project));
    }
    let rows = rows.as_slice();

    let cohort_id = retry_on_lock("create_cohort_from_upload", max_lock_wait_ms, || async move {
        insert_cohort_with_candidates(pool, cohort, rows).await
    })
    .await?;

    tracing::info!(
        cohort_id,
        name = %cohort.name,
        candidates = rows.len(),
        validate_as_user_ids = cohort.validate_as_user_ids,
        "Cohort created from upload"
    );

    load_cohort(pool, cohort_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("cohort {} vanished after insert", cohort_id)))
}

async fn insert_cohort_with_candidates(
    pool: &SqlitePool,
    cohort: &NewCohort,
    rows: &[(&str, &str)],
) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let cohort_id = sqlx::query(
        r#"
        INSERT INTO cohort (name, description, default_project, validated, validate_as_user_ids)
        VALUES (?, ?, ?, 0, ?)
        "#,
    )
    .bind(&cohort.name)
    .bind(&cohort.description)
    .bind(&cohort.default_project)
    .bind(cohort.validate_as_user_ids)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for (username, project) in rows {
        sqlx::query(
            r#"
            INSERT INTO wiki_user (mediawiki_username, raw_username, project, validating_cohort)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(*username)
        .bind(*username)
        .bind(*project)
        .bind(cohort_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(cohort_id)
}

/// Load a cohort by id
pub async fn load_cohort<'e, E>(executor: E, cohort_id: i64) -> Result<Option<Cohort>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let cohort = sqlx::query_as::<_, Cohort>(
        r#"
        SELECT id, name, description, default_project, enabled, public, validated,
               validate_as_user_ids, validation_queue_key, created_at
        FROM cohort
        WHERE id = ?
        "#,
    )
    .bind(cohort_id)
    .fetch_optional(executor)
    .await?;

    Ok(cohort)
}

/// Record the run token that external callers poll by
pub async fn set_validation_queue_key<'e, E>(executor: E, cohort_id: i64, key: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE cohort SET validation_queue_key = ? WHERE id = ?")
        .bind(key)
        .bind(cohort_id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("cohort {}", cohort_id)));
    }
    Ok(())
}

/// Validation progress of a cohort, readable at any time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortStatus {
    pub cohort_id: i64,
    pub validated: bool,
    pub validation_queue_key: Option<String>,
    /// Candidate rows currently in the working table
    pub total: i64,
    pub valid: i64,
    pub invalid: i64,
    /// Not yet classified by the current or last run
    pub unknown: i64,
    /// Committed membership rows
    pub members: i64,
}

/// Read validation progress straight from the metadata store
pub async fn cohort_status(pool: &SqlitePool, cohort_id: i64) -> Result<CohortStatus> {
    let cohort = load_cohort(pool, cohort_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("cohort {}", cohort_id)))?;

    let (total, valid, invalid, unknown): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(CASE WHEN valid = 1 THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN valid = 0 THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN valid IS NULL THEN 1 ELSE 0 END), 0)
        FROM wiki_user
        WHERE validating_cohort = ?
        "#,
    )
    .bind(cohort_id)
    .fetch_one(pool)
    .await?;

    let members: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cohort_wiki_user WHERE cohort_id = ?")
        .bind(cohort_id)
        .fetch_one(pool)
        .await?;

    Ok(CohortStatus {
        cohort_id,
        validated: cohort.validated,
        validation_queue_key: cohort.validation_queue_key,
        total,
        valid,
        invalid,
        unknown,
        members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_common::db::init_database;
    use tempfile::TempDir;

    fn new_cohort(default_project: Option<&str>) -> NewCohort {
        NewCohort {
            name: "editors".to_string(),
            description: None,
            default_project: default_project.map(str::to_string),
            validate_as_user_ids: false,
        }
    }

    #[tokio::test]
    async fn test_create_inserts_unvalidated_candidates() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("cohorts.db")).await.unwrap();

        let records = vec![UploadRecord::new("Alice", "enwiki"), UploadRecord::new("Bob", "")];
        let cohort = create_cohort_from_upload(&pool, &new_cohort(Some("dewiki")), &records, 1000)
            .await
            .unwrap();

        assert!(!cohort.validated);
        assert!(!cohort.validate_as_user_ids);

        let projects: Vec<String> =
            sqlx::query_scalar("SELECT project FROM wiki_user WHERE validating_cohort = ? ORDER BY id")
                .bind(cohort.id)
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(projects, vec!["enwiki", "dewiki"]);

        let status = cohort_status(&pool, cohort.id).await.unwrap();
        assert_eq!((status.total, status.unknown, status.valid, status.members), (2, 2, 0, 0));
    }

    #[tokio::test]
    async fn test_create_rejects_missing_project() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("cohorts.db")).await.unwrap();

        let records = vec![UploadRecord::new("Bob", "  ")];
        let result = create_cohort_from_upload(&pool, &new_cohort(None), &records, 1000).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cohort")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_queue_key_on_missing_cohort() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("cohorts.db")).await.unwrap();

        let result = set_validation_queue_key(&pool, 99, "token").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(matches!(cohort_status(&pool, 99).await, Err(Error::NotFound(_))));
    }
}
