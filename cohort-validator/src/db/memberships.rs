//! Committed cohort membership (`cohort_wiki_user`)

use cohort_common::db::{CandidateIdentity, CohortMembership};
use cohort_common::Result;
use sqlx::{Executor, Sqlite};

/// Membership rows of a cohort
pub async fn list_members<'e, E>(executor: E, cohort_id: i64) -> Result<Vec<CohortMembership>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, CohortMembership>(
        "SELECT id, cohort_id, wiki_user_id FROM cohort_wiki_user WHERE cohort_id = ? ORDER BY wiki_user_id",
    )
    .bind(cohort_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Identities behind a cohort's membership rows, in upload order
pub async fn member_identities<'e, E>(executor: E, cohort_id: i64) -> Result<Vec<CandidateIdentity>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, CandidateIdentity>(
        r#"
        SELECT w.id, w.mediawiki_username, w.raw_username, w.mediawiki_userid, w.project, w.resolved_project,
               w.valid, w.reason_invalid, w.validating_cohort
        FROM cohort_wiki_user m
        JOIN wiki_user w ON w.id = m.wiki_user_id
        WHERE m.cohort_id = ?
        ORDER BY w.id
        "#,
    )
    .bind(cohort_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}
