//! Data models for the validation pipeline
//!
//! - Run lifecycle (token, state, report)
//! - Per-candidate verdicts

pub mod validation_run;
pub mod verdict;

pub use validation_run::{RunStatus, RunToken, ValidationMode, ValidationReport, ValidationState};
pub use verdict::{InvalidReason, Verdict};
