//! # Cohort Common Library
//!
//! Shared code for the cohort validation tooling:
//! - Error type used by every crate in the workspace
//! - Bootstrap configuration (TOML) and root folder resolution
//! - Local metadata store initialization and row models

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
