//! Metadata store access for the validation pipeline
//!
//! Single-statement reads take any SQLite executor (pool or the run's
//! connection). Multi-statement writes take the run's connection and wrap
//! themselves in a monitored transaction.

pub mod candidates;
pub mod cohorts;
pub mod memberships;
