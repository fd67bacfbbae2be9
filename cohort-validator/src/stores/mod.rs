//! Authoritative per-project identity stores
//!
//! Each project has its own source of truth for which accounts exist. The
//! pipeline only reads from it: one round trip per batch, by id set or by
//! name set.

mod registry;
mod sqlite_store;

pub use registry::StoreRegistry;
pub use sqlite_store::{ensure_user_table, SqliteProjectStore, SqliteStoreConnector};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::directory::StoreLocation;

/// Ground-truth account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthoritativeIdentity {
    pub user_id: i64,
    pub user_name: String,
}

/// Authoritative store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("cannot connect: {0}")]
    Connect(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Read-only access to one project's accounts
#[async_trait]
pub trait AuthoritativeStore: Send + Sync {
    /// Accounts whose numeric id is in `ids`
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<AuthoritativeIdentity>, StoreError>;

    /// Accounts whose canonical name is in `names`
    async fn find_by_names(&self, names: &[String]) -> Result<Vec<AuthoritativeIdentity>, StoreError>;

    /// Release pooled connections
    async fn close(&self) {}
}

/// Opens store handles for directory entries
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(
        &self,
        project: &str,
        location: &StoreLocation,
    ) -> Result<Arc<dyn AuthoritativeStore>, StoreError>;
}
