//! Candidate identity rows (`wiki_user`)

use cohort_common::db::CandidateIdentity;
use cohort_common::Result;
use sqlx::{Executor, Sqlite, SqliteConnection};

use crate::utils::begin_monitored;

/// Return a cohort to the unvalidated state
///
/// Clears `validated`, every candidate's classification and every committed
/// membership, atomically, and puts each identity back to its uploaded form.
/// Runs on entry to every validation attempt.
pub async fn reset_validation(conn: &mut SqliteConnection, cohort_id: i64) -> Result<u64> {
    let mut tx = begin_monitored(conn, "reset_validation").await?;

    sqlx::query("UPDATE cohort SET validated = 0 WHERE id = ?")
        .bind(cohort_id)
        .execute(tx.conn())
        .await?;

    let reset = sqlx::query(
        r#"
        UPDATE wiki_user
        SET mediawiki_username = raw_username, mediawiki_userid = NULL,
            resolved_project = NULL, valid = NULL, reason_invalid = NULL
        WHERE validating_cohort = ?
        "#,
    )
    .bind(cohort_id)
    .execute(tx.conn())
    .await?
    .rows_affected();

    let memberships = sqlx::query("DELETE FROM cohort_wiki_user WHERE cohort_id = ?")
        .bind(cohort_id)
        .execute(tx.conn())
        .await?
        .rows_affected();

    tx.commit().await?;

    tracing::debug!(cohort_id, candidates = reset, memberships, "Validation state reset");
    Ok(reset)
}

/// All candidates of a cohort in upload order
pub async fn load_candidates<'e, E>(executor: E, cohort_id: i64) -> Result<Vec<CandidateIdentity>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, CandidateIdentity>(
        r#"
        SELECT id, mediawiki_username, raw_username, mediawiki_userid, project, resolved_project,
               valid, reason_invalid, validating_cohort
        FROM wiki_user
        WHERE validating_cohort = ?
        ORDER BY id
        "#,
    )
    .bind(cohort_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Write classification results back, one transaction per call
pub async fn persist_classifications(
    conn: &mut SqliteConnection,
    candidates: &[&CandidateIdentity],
) -> Result<()> {
    if candidates.is_empty() {
        return Ok(());
    }

    let mut tx = begin_monitored(conn, "persist_classifications").await?;

    for candidate in candidates {
        sqlx::query(
            r#"
            UPDATE wiki_user
            SET mediawiki_username = ?, mediawiki_userid = ?, resolved_project = ?,
                valid = ?, reason_invalid = ?
            WHERE id = ?
            "#,
        )
        .bind(&candidate.mediawiki_username)
        .bind(candidate.mediawiki_userid)
        .bind(&candidate.resolved_project)
        .bind(candidate.valid)
        .bind(&candidate.reason_invalid)
        .bind(candidate.id)
        .execute(tx.conn())
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
