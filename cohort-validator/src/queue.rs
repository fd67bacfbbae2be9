//! In-process validation queue
//!
//! Schedules orchestrator runs on the tokio runtime and tracks them by run
//! token. At most one run per cohort may be active; a second submission is
//! refused until the first reaches a terminal state. Finished runs stay
//! pollable for a retention window and are pruned on the next submission.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::db::cohorts;
use crate::error::{ValidationError, ValidationResult};
use crate::models::{RunStatus, RunToken, ValidationState};
use crate::services::ValidationOrchestrator;

/// How long a finished run's status stays available
const FINISHED_RUN_RETENTION_HOURS: i64 = 1;

/// Book-keeping for one submitted run
struct RunHandle {
    cohort_id: i64,
    status: watch::Receiver<RunStatus>,
    cancel: CancellationToken,
}

impl RunHandle {
    fn is_active(&self) -> bool {
        !self.status.borrow().state.is_terminal()
    }

    /// Finished at least `retention` ago
    fn is_expired(&self, retention: Duration) -> bool {
        let status = self.status.borrow();
        match status.ended_at {
            Some(ended_at) => status.state.is_terminal() && Utc::now() - ended_at >= retention,
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct ValidationQueue {
    orchestrator: Arc<ValidationOrchestrator>,
    runs: Arc<RwLock<HashMap<RunToken, RunHandle>>>,
    retention: Duration,
}

impl ValidationQueue {
    pub fn new(orchestrator: Arc<ValidationOrchestrator>) -> Self {
        Self {
            orchestrator,
            runs: Arc::new(RwLock::new(HashMap::new())),
            retention: Duration::hours(FINISHED_RUN_RETENTION_HOURS),
        }
    }

    /// Keep finished runs for `retention` instead of the default hour
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Schedule a validation run for `cohort_id`
    ///
    /// The token is written to the cohort's `validation_queue_key` before the
    /// run starts, so it can be polled immediately.
    pub async fn submit(&self, cohort_id: i64) -> ValidationResult<RunToken> {
        let db = self.orchestrator.db();
        if cohorts::load_cohort(db, cohort_id).await?.is_none() {
            return Err(ValidationError::CohortNotFound(cohort_id));
        }

        // Held until the run is registered so two submissions cannot both pass the check
        let mut runs = self.runs.write().await;

        let before = runs.len();
        runs.retain(|_, run| !run.is_expired(self.retention));
        if runs.len() < before {
            tracing::debug!(pruned = before - runs.len(), "Finished validation runs pruned");
        }

        if runs.values().any(|run| run.cohort_id == cohort_id && run.is_active()) {
            tracing::warn!(cohort_id, "Validation already running, submission refused");
            return Err(ValidationError::AlreadyRunning(cohort_id));
        }

        let token = RunToken::new();
        cohorts::set_validation_queue_key(db, cohort_id, &token.to_string()).await?;

        let (status_tx, status_rx) = watch::channel(RunStatus::pending(token, cohort_id));
        let cancel = CancellationToken::new();
        runs.insert(
            token,
            RunHandle {
                cohort_id,
                status: status_rx,
                cancel: cancel.clone(),
            },
        );
        drop(runs);

        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            tracing::info!(cohort_id, run_token = %token, "Validation task started");
            status_tx.send_modify(|s| s.transition_to(ValidationState::Validating));

            let worker = tokio::spawn(async move { orchestrator.run(cohort_id, token, &cancel).await });
            let result = match worker.await {
                Ok(result) => result,
                Err(e) => Err(ValidationError::Task(e.to_string())),
            };

            status_tx.send_modify(|s| match result {
                Ok(report) => {
                    s.report = Some(report);
                    s.transition_to(ValidationState::Committed);
                }
                Err(ValidationError::Cancelled(_)) => {
                    s.transition_to(ValidationState::Cancelled);
                }
                Err(e) => {
                    tracing::error!(cohort_id, run_token = %token, error = %e, "Validation run failed");
                    s.error = Some(e.to_string());
                    s.transition_to(ValidationState::Failed);
                }
            });
        });

        tracing::info!(cohort_id, run_token = %token, "Validation run submitted");
        Ok(token)
    }

    /// Current status of a run
    pub async fn status(&self, token: RunToken) -> ValidationResult<RunStatus> {
        let runs = self.runs.read().await;
        let run = runs.get(&token).ok_or(ValidationError::UnknownRun(token))?;
        let status = run.status.borrow().clone();
        Ok(status)
    }

    /// Wait for a run to reach a terminal state
    pub async fn wait(&self, token: RunToken) -> ValidationResult<RunStatus> {
        let mut status = {
            let runs = self.runs.read().await;
            runs.get(&token)
                .ok_or(ValidationError::UnknownRun(token))?
                .status
                .clone()
        };

        let finished = status
            .wait_for(|s| s.state.is_terminal())
            .await
            .map_err(|_| ValidationError::Task(format!("run {} ended without a final status", token)))?
            .clone();
        Ok(finished)
    }

    /// Request cooperative cancellation
    ///
    /// Returns false if the run had already finished. The run stops at its
    /// next batch boundary.
    pub async fn cancel(&self, token: RunToken) -> ValidationResult<bool> {
        let runs = self.runs.read().await;
        let run = runs.get(&token).ok_or(ValidationError::UnknownRun(token))?;

        if !run.is_active() {
            return Ok(false);
        }

        run.cancel.cancel();
        tracing::info!(cohort_id = run.cohort_id, run_token = %token, "Validation cancellation requested");
        Ok(true)
    }
}
