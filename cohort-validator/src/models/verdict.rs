//! Per-candidate classification results

use cohort_common::db::CandidateIdentity;
use std::fmt;

/// Why a candidate was rejected; the `Display` form is stored as `reason_invalid`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// Project not in the directory, even after suffix completion
    Project(String),
    /// Id mode: not a non-negative integer, or no such id
    UserId(String),
    /// Name mode: no such user
    UserName(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Project(name) => write!(f, "invalid project: {}", name),
            InvalidReason::UserId(key) => write!(f, "invalid user id: {}", key),
            InvalidReason::UserName(key) => write!(f, "invalid user name: {}", key),
        }
    }
}

/// Outcome for one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Matched an authoritative account
    Valid { user_id: i64, user_name: String },
    Invalid(InvalidReason),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid { .. })
    }

    /// Record the verdict on the candidate row
    ///
    /// A match overwrites the identity string with the authoritative name;
    /// `raw_username` is never touched.
    pub fn apply(self, candidate: &mut CandidateIdentity) {
        match self {
            Verdict::Valid { user_id, user_name } => {
                candidate.mediawiki_username = user_name;
                candidate.mediawiki_userid = Some(user_id);
                candidate.valid = Some(true);
                candidate.reason_invalid = None;
            }
            Verdict::Invalid(reason) => {
                candidate.mediawiki_userid = None;
                candidate.valid = Some(false);
                candidate.reason_invalid = Some(reason.to_string());
            }
        }
    }
}
