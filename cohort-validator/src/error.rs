//! Error types for the validation pipeline
//!
//! Per-candidate problems (unknown project, malformed id, no match) are not
//! errors: they become `valid = false` plus a reason on the candidate row.
//! Everything here aborts the current run attempt.

use thiserror::Error;

use crate::directory::DirectoryError;
use crate::models::RunToken;
use crate::stores::StoreError;

/// Run-level validation failure
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Cohort id does not exist in the metadata store
    #[error("Cohort not found: {0}")]
    CohortNotFound(i64),

    /// A run for this cohort is still active
    #[error("Validation already running for cohort {0}")]
    AlreadyRunning(i64),

    /// Run token not issued by this queue
    #[error("Unknown validation run: {0}")]
    UnknownRun(RunToken),

    /// Project directory could not be loaded
    #[error("Project directory unavailable: {0}")]
    Directory(#[from] DirectoryError),

    /// A project's authoritative store failed mid-batch
    #[error("Authoritative store for {project} unavailable: {source}")]
    Store {
        project: String,
        #[source]
        source: StoreError,
    },

    /// Local metadata store failure
    #[error("Metadata store error: {0}")]
    Metadata(#[from] cohort_common::Error),

    /// Cancelled at a batch boundary
    #[error("Validation cancelled for cohort {0}")]
    Cancelled(i64),

    /// Background task panicked or was aborted
    #[error("Validation task failed: {0}")]
    Task(String),
}

impl From<sqlx::Error> for ValidationError {
    fn from(err: sqlx::Error) -> Self {
        ValidationError::Metadata(cohort_common::Error::Database(err))
    }
}

impl ValidationError {
    /// Attach the project name to a store failure
    pub fn store(project: impl Into<String>, source: StoreError) -> Self {
        ValidationError::Store {
            project: project.into(),
            source,
        }
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;
