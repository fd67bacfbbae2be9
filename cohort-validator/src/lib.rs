//! cohort-validator library interface
//!
//! Exposes the validation pipeline for the binary and for integration tests.

pub mod db;
pub mod directory;
pub mod error;
pub mod models;
pub mod queue;
pub mod services;
pub mod stores;
pub mod utils;

pub use crate::error::{ValidationError, ValidationResult};
pub use crate::queue::ValidationQueue;
