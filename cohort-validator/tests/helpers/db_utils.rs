//! Database Test Utilities

use anyhow::Result;
use cohort_common::db::{init_database, NewCohort, UploadRecord};
use cohort_validator::db::{candidates, cohorts, memberships};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create temporary metadata store with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let pool = init_database(&temp_dir.path().join("test_cohorts.db")).await?;
    Ok((temp_dir, pool))
}

/// Create a cohort from (identity, project) pairs; returns the cohort id
pub async fn create_test_cohort(
    pool: &SqlitePool,
    validate_as_user_ids: bool,
    records: &[(&str, &str)],
) -> Result<i64> {
    let records: Vec<UploadRecord> = records
        .iter()
        .map(|(name, project)| UploadRecord::new(*name, *project))
        .collect();

    let cohort = cohorts::create_cohort_from_upload(
        pool,
        &NewCohort {
            name: "test cohort".to_string(),
            description: None,
            default_project: None,
            validate_as_user_ids,
        },
        &records,
        1000,
    )
    .await?;

    Ok(cohort.id)
}

/// (identity, raw project, resolved project, valid, reason)
pub type CandidateRow = (String, String, Option<String>, Option<bool>, Option<String>);

/// Expected candidate row
pub fn row(
    identity: &str,
    project: &str,
    resolved: Option<&str>,
    valid: Option<bool>,
    reason: Option<&str>,
) -> CandidateRow {
    (
        identity.to_string(),
        project.to_string(),
        resolved.map(str::to_string),
        valid,
        reason.map(str::to_string),
    )
}

/// Comparable view of a cohort's candidate rows, in upload order
pub async fn snapshot_candidates(pool: &SqlitePool, cohort_id: i64) -> Result<Vec<CandidateRow>> {
    Ok(candidates::load_candidates(pool, cohort_id)
        .await?
        .into_iter()
        .map(|c| (c.mediawiki_username, c.project, c.resolved_project, c.valid, c.reason_invalid))
        .collect())
}

/// (identity, resolved project, authoritative id)
pub type MemberRow = (String, String, Option<i64>);

pub fn member(identity: &str, project: &str, user_id: i64) -> MemberRow {
    (identity.to_string(), project.to_string(), Some(user_id))
}

/// Comparable view of a cohort's members, in upload order
pub async fn snapshot_members(pool: &SqlitePool, cohort_id: i64) -> Result<Vec<MemberRow>> {
    Ok(memberships::member_identities(pool, cohort_id)
        .await?
        .into_iter()
        .map(|c| {
            let project = c.effective_project().to_string();
            (c.mediawiki_username, project, c.mediawiki_userid)
        })
        .collect())
}
