//! Validation Orchestrator
//!
//! Drives one cohort from unvalidated to validated:
//!
//! 1. Acquire one metadata connection for the run (released on every exit)
//! 2. Record the run token, then reset all classification state
//! 3. Take one directory snapshot for the whole run
//! 4. Deduplicate by (uploaded identity, uploaded project)
//! 5. Normalize projects; unknown ones are classified invalid on the spot
//! 6. Accumulate per-project batches, flushing each as it reaches the cap
//! 7. Flush the remaining partial batches
//! 8. Deduplicate the classified set again and commit
//!
//! Every flush persists its classifications, so progress is observable while
//! the run is in flight. Cancellation is honored only at batch boundaries.

use std::collections::BTreeMap;
use std::sync::Arc;

use cohort_common::config::ValidationConfig;
use cohort_common::db::CandidateIdentity;
use sqlx::{SqliteConnection, SqlitePool};
use tokio_util::sync::CancellationToken;

use crate::db::{candidates, cohorts};
use crate::directory::StoreLocation;
use crate::error::{ValidationError, ValidationResult};
use crate::models::{InvalidReason, RunToken, ValidationMode, ValidationReport, Verdict};
use crate::services::batch_validator::BatchValidator;
use crate::services::deduplicator::deduplicate_by_key;
use crate::services::membership_committer::MembershipCommitter;
use crate::services::project_normalizer::{ProjectNormalizer, UnknownProject};
use crate::stores::StoreRegistry;

/// Tunables for a run
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Maximum candidates per store query
    pub batch_size: usize,
    /// Appended once when a project name is not found as typed
    pub project_suffix: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            batch_size: 999,
            project_suffix: "wiki".to_string(),
        }
    }
}

impl From<&ValidationConfig> for OrchestratorSettings {
    fn from(config: &ValidationConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            project_suffix: config.project_suffix.clone(),
        }
    }
}

/// Candidates accumulated for one canonical project
struct PendingBatch {
    location: StoreLocation,
    /// Positions in the run's working set
    members: Vec<usize>,
}

/// Mutable state of one run
struct RunState<'a> {
    cohort_id: i64,
    conn: &'a mut SqliteConnection,
    cancel: &'a CancellationToken,
    validator: BatchValidator,
    working: Vec<CandidateIdentity>,
    store_queries: usize,
    batches_flushed: usize,
}

pub struct ValidationOrchestrator {
    db: SqlitePool,
    registry: Arc<StoreRegistry>,
    settings: OrchestratorSettings,
}

impl ValidationOrchestrator {
    pub fn new(db: SqlitePool, registry: Arc<StoreRegistry>, settings: OrchestratorSettings) -> Self {
        Self { db, registry, settings }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    /// Validate `cohort_id` end to end
    ///
    /// On any error the cohort is left with `validated = false`; the next run
    /// resets and starts over.
    pub async fn run(
        &self,
        cohort_id: i64,
        token: RunToken,
        cancel: &CancellationToken,
    ) -> ValidationResult<ValidationReport> {
        let mut conn = self.db.acquire().await?;

        let cohort = cohorts::load_cohort(&mut *conn, cohort_id)
            .await?
            .ok_or(ValidationError::CohortNotFound(cohort_id))?;
        let mode = ValidationMode::from_flag(cohort.validate_as_user_ids);

        tracing::info!(cohort_id, run_token = %token, ?mode, "Validation run started");

        cohorts::set_validation_queue_key(&mut *conn, cohort_id, &token.to_string()).await?;
        candidates::reset_validation(&mut conn, cohort_id).await?;

        let directory = self.registry.directory().snapshot().await?;
        let normalizer = ProjectNormalizer::new(&directory, &self.settings.project_suffix);

        let loaded = candidates::load_candidates(&mut *conn, cohort_id).await?;
        let total = loaded.len();
        let working = deduplicate_by_key(loaded, |c| (c.raw_username.clone(), c.project.clone()));
        tracing::debug!(cohort_id, total, unique = working.len(), "Candidates loaded");

        let mut run = RunState {
            cohort_id,
            conn: &mut *conn,
            cancel,
            validator: BatchValidator::new(mode),
            working,
            store_queries: 0,
            batches_flushed: 0,
        };

        // Normalize everything up front; the directory snapshot is fixed for the run
        let mut routed: Vec<(usize, String, StoreLocation)> = Vec::with_capacity(run.working.len());
        let mut unknown = Vec::new();
        for (i, candidate) in run.working.iter_mut().enumerate() {
            match normalizer.normalize(&candidate.project) {
                Ok(project) => {
                    candidate.resolved_project = Some(project.name.clone());
                    routed.push((i, project.name, project.location));
                }
                Err(UnknownProject(raw)) => {
                    Verdict::Invalid(InvalidReason::Project(raw)).apply(candidate);
                    unknown.push(i);
                }
            }
        }
        if !unknown.is_empty() {
            tracing::info!(cohort_id, count = unknown.len(), "Candidates with unknown project");
            let rows: Vec<&CandidateIdentity> = unknown.iter().map(|&i| &run.working[i]).collect();
            candidates::persist_classifications(&mut *run.conn, &rows).await?;
        }

        let batch_size = self.settings.batch_size.max(1);
        let mut pending: BTreeMap<String, PendingBatch> = BTreeMap::new();
        for (i, project, location) in routed {
            let batch = pending.entry(project.clone()).or_insert_with(|| PendingBatch {
                location,
                members: Vec::with_capacity(batch_size),
            });
            batch.members.push(i);

            if batch.members.len() >= batch_size {
                if let Some(full) = pending.remove(&project) {
                    self.flush(&mut run, &project, full).await?;
                }
            }
        }

        for (project, batch) in pending {
            self.flush(&mut run, &project, batch).await?;
        }

        if cancel.is_cancelled() {
            tracing::info!(cohort_id, "Validation cancelled before commit");
            return Err(ValidationError::Cancelled(cohort_id));
        }

        let store_queries = run.store_queries;
        let batches_flushed = run.batches_flushed;
        let survivors = deduplicate_by_key(run.working, |c| {
            (c.is_valid(), c.mediawiki_username.clone(), c.effective_project().to_string())
        });
        let valid = survivors.iter().filter(|c| c.is_valid()).count();

        let outcome = MembershipCommitter::commit(&mut conn, cohort_id, &survivors).await?;

        let report = ValidationReport {
            cohort_id,
            run_token: token,
            total,
            unique: survivors.len(),
            valid,
            invalid: survivors.len() - valid,
            committed: outcome.inserted,
            discarded: outcome.removed,
            store_queries,
        };

        tracing::info!(
            cohort_id,
            run_token = %token,
            total = report.total,
            unique = report.unique,
            valid = report.valid,
            invalid = report.invalid,
            batches = batches_flushed,
            store_queries = report.store_queries,
            "Validation run committed"
        );

        Ok(report)
    }

    /// Validate one batch and persist its classifications
    async fn flush(&self, run: &mut RunState<'_>, project: &str, batch: PendingBatch) -> ValidationResult<()> {
        if run.cancel.is_cancelled() {
            tracing::info!(
                cohort_id = run.cohort_id,
                project,
                batches_flushed = run.batches_flushed,
                "Validation cancelled at batch boundary"
            );
            return Err(ValidationError::Cancelled(run.cohort_id));
        }

        let store = self
            .registry
            .store_for(project, &batch.location)
            .await
            .map_err(|e| ValidationError::store(project, e))?;

        let identities: Vec<&str> = batch
            .members
            .iter()
            .map(|&i| run.working[i].raw_username.as_str())
            .collect();

        let outcome = match run.validator.validate(store.as_ref(), &identities).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    cohort_id = run.cohort_id,
                    project,
                    batch_len = identities.len(),
                    error = %e,
                    "Authoritative store query failed"
                );
                return Err(ValidationError::store(project, e));
            }
        };

        let mut valid = 0;
        for (&i, verdict) in batch.members.iter().zip(outcome.verdicts) {
            if verdict.is_valid() {
                valid += 1;
            }
            verdict.apply(&mut run.working[i]);
        }

        let rows: Vec<&CandidateIdentity> = batch.members.iter().map(|&i| &run.working[i]).collect();
        candidates::persist_classifications(&mut *run.conn, &rows).await?;

        run.store_queries += outcome.store_queries;
        run.batches_flushed += 1;

        tracing::info!(
            cohort_id = run.cohort_id,
            project,
            batch_len = batch.members.len(),
            valid,
            invalid = batch.members.len() - valid,
            "Batch flushed"
        );

        Ok(())
    }
}
