//! Database models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A named collection of identities under analysis
///
/// Usable for analytics only while `validated` is true.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cohort {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub default_project: Option<String>,
    pub enabled: bool,
    pub public: bool,
    pub validated: bool,
    /// Fixed at creation: true validates by numeric user id, false by user name
    pub validate_as_user_ids: bool,
    /// Run token of the most recent validation run
    pub validation_queue_key: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Raw uploaded identity awaiting classification (`wiki_user` row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CandidateIdentity {
    pub id: i64,
    /// User name or numeric id string; overwritten with the canonical name on a match
    pub mediawiki_username: String,
    /// Identity string as uploaded; every run starts again from it
    pub raw_username: String,
    /// Authoritative numeric id, set on a match
    pub mediawiki_userid: Option<i64>,
    /// Project name as uploaded
    pub project: String,
    /// Canonical project chosen during validation
    pub resolved_project: Option<String>,
    /// None until classified
    pub valid: Option<bool>,
    pub reason_invalid: Option<String>,
    pub validating_cohort: i64,
}

impl CandidateIdentity {
    /// Project used for grouping after normalization (falls back to the raw name)
    pub fn effective_project(&self) -> &str {
        self.resolved_project.as_deref().unwrap_or(&self.project)
    }

    pub fn is_valid(&self) -> bool {
        self.valid == Some(true)
    }
}

/// Confirmed (cohort, identity) association consumed by analytics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CohortMembership {
    pub id: i64,
    pub cohort_id: i64,
    pub wiki_user_id: i64,
}

/// One parsed upload row, before it becomes a CandidateIdentity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub username: String,
    /// Blank means the cohort's default project
    #[serde(default)]
    pub project: String,
}

impl UploadRecord {
    pub fn new(username: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            project: project.into(),
        }
    }
}

/// Attributes of a cohort created from an upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCohort {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_project: Option<String>,
    pub validate_as_user_ids: bool,
}
