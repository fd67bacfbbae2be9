//! Validation run state machine
//!
//! PENDING → VALIDATING → COMMITTED, with VALIDATING → FAILED on store or
//! directory errors and VALIDATING → CANCELLED at a batch boundary. A retry
//! starts again from PENDING; the run resets all classification on entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Correlation token for one scheduled run, stored on the cohort as
/// `validation_queue_key`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunToken(Uuid);

impl RunToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RunToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationState {
    /// Submitted, not started
    Pending,
    /// Classification reset and batches flushing
    Validating,
    /// Memberships written, cohort validated
    Committed,
    /// Store or directory failure; cohort left unvalidated
    Failed,
    /// Stopped at a batch boundary; cohort left unvalidated
    Cancelled,
}

impl ValidationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ValidationState::Committed | ValidationState::Failed | ValidationState::Cancelled
        )
    }
}

/// How candidate identity strings are matched against the authoritative store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    ByUserId,
    ByUserName,
}

impl ValidationMode {
    /// Mode for a cohort's `validate_as_user_ids` flag
    pub fn from_flag(validate_as_user_ids: bool) -> Self {
        if validate_as_user_ids {
            ValidationMode::ByUserId
        } else {
            ValidationMode::ByUserName
        }
    }
}

/// Summary of a committed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub cohort_id: i64,
    pub run_token: RunToken,
    /// Candidate rows loaded at the start of the run
    pub total: usize,
    /// Rows kept after both dedup passes
    pub unique: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Membership rows written
    pub committed: usize,
    /// Candidate rows deleted as duplicates
    pub discarded: usize,
    /// Authoritative store round trips
    pub store_queries: usize,
}

/// Externally visible status of a submitted run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub token: RunToken,
    pub cohort_id: i64,
    pub state: ValidationState,
    pub submitted_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Present once committed
    pub report: Option<ValidationReport>,
    /// Present once failed
    pub error: Option<String>,
}

impl RunStatus {
    pub fn pending(token: RunToken, cohort_id: i64) -> Self {
        Self {
            token,
            cohort_id,
            state: ValidationState::Pending,
            submitted_at: Utc::now(),
            ended_at: None,
            report: None,
            error: None,
        }
    }

    /// Move to `new_state`, stamping the end time for terminal states
    pub fn transition_to(&mut self, new_state: ValidationState) {
        self.state = new_state;
        if new_state.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
    }
}
