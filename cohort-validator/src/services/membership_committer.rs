//! Membership Committer
//!
//! The final durable phase of a run. Membership inserts, removal of discarded
//! candidate rows and `validated = true` share one transaction, so readers
//! see either the previous (reset) state or the complete result.

use cohort_common::db::CandidateIdentity;
use cohort_common::Result;
use sqlx::SqliteConnection;

use crate::utils::begin_monitored;

/// Row counts written by a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitOutcome {
    /// Membership rows inserted
    pub inserted: usize,
    /// Candidate rows deleted (duplicates)
    pub removed: usize,
}

pub struct MembershipCommitter;

impl MembershipCommitter {
    /// Commit the final candidate set of a run
    ///
    /// **Algorithm:**
    /// 1. Stage the ids of every surviving candidate in a temp table
    /// 2. Insert one membership row per valid survivor
    /// 3. Delete the cohort's candidate rows that did not survive
    /// 4. Mark the cohort validated
    ///
    /// Invalid survivors stay in the working table with their reason.
    pub async fn commit(
        conn: &mut SqliteConnection,
        cohort_id: i64,
        survivors: &[CandidateIdentity],
    ) -> Result<CommitOutcome> {
        let mut tx = begin_monitored(conn, "membership_commit").await?;

        sqlx::query("CREATE TEMP TABLE IF NOT EXISTS commit_keep (id INTEGER PRIMARY KEY)")
            .execute(tx.conn())
            .await?;
        sqlx::query("DELETE FROM temp.commit_keep").execute(tx.conn()).await?;

        let mut inserted = 0;
        for candidate in survivors {
            sqlx::query("INSERT OR IGNORE INTO temp.commit_keep (id) VALUES (?)")
                .bind(candidate.id)
                .execute(tx.conn())
                .await?;

            if candidate.is_valid() {
                inserted += sqlx::query(
                    "INSERT OR IGNORE INTO cohort_wiki_user (cohort_id, wiki_user_id) VALUES (?, ?)",
                )
                .bind(cohort_id)
                .bind(candidate.id)
                .execute(tx.conn())
                .await?
                .rows_affected() as usize;
            }
        }

        let removed = sqlx::query(
            r#"
            DELETE FROM wiki_user
            WHERE validating_cohort = ?
              AND id NOT IN (SELECT id FROM temp.commit_keep)
            "#,
        )
        .bind(cohort_id)
        .execute(tx.conn())
        .await?
        .rows_affected() as usize;

        sqlx::query("UPDATE cohort SET validated = 1 WHERE id = ?")
            .bind(cohort_id)
            .execute(tx.conn())
            .await?;

        sqlx::query("DROP TABLE IF EXISTS temp.commit_keep")
            .execute(tx.conn())
            .await?;

        tx.commit().await?;

        tracing::info!(cohort_id, inserted, removed, "Cohort membership committed");
        Ok(CommitOutcome { inserted, removed })
    }
}
