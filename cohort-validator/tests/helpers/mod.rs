//! Test Helper Utilities
//!
//! Shared utilities for testing cohort-validator

#![allow(dead_code)]

pub mod db_utils;
pub mod memory_store;

pub use db_utils::{
    create_test_cohort, create_test_db, member, row, snapshot_candidates, snapshot_members, CandidateRow,
    MemberRow,
};
pub use memory_store::{test_registry, Gate, MemoryConnector, MemoryStore};
