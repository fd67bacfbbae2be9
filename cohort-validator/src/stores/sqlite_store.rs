//! SQLite-backed authoritative store
//!
//! Reads the MediaWiki-shaped `user (user_id, user_name)` table of one
//! project database.

use async_trait::async_trait;
use cohort_common::config::StoreConfig;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{AuthoritativeIdentity, AuthoritativeStore, StoreConnector, StoreError};
use crate::directory::StoreLocation;

/// One project's user table
pub struct SqliteProjectStore {
    pool: SqlitePool,
}

impl SqliteProjectStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthoritativeStore for SqliteProjectStore {
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<AuthoritativeIdentity>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT user_id, user_name FROM user WHERE user_id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows = query
            .build_query_as::<AuthoritativeIdentity>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_by_names(&self, names: &[String]) -> Result<Vec<AuthoritativeIdentity>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT user_id, user_name FROM user WHERE user_name IN (");
        let mut separated = query.separated(", ");
        for name in names {
            separated.push_bind(name.as_str());
        }
        separated.push_unseparated(")");

        let rows = query
            .build_query_as::<AuthoritativeIdentity>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Opens project stores from a URL template
///
/// `{root}`, `{project}` and `{host}` in the template are replaced by the root
/// folder, the canonical project name and the directory's store location.
pub struct SqliteStoreConnector {
    url_template: String,
    root_folder: PathBuf,
    max_connections: u32,
}

impl SqliteStoreConnector {
    pub fn new(url_template: impl Into<String>, root_folder: impl Into<PathBuf>, max_connections: u32) -> Self {
        Self {
            url_template: url_template.into(),
            root_folder: root_folder.into(),
            max_connections,
        }
    }

    pub fn from_config(config: &StoreConfig, root_folder: &Path) -> Self {
        Self::new(config.url_template.clone(), root_folder, config.max_connections)
    }

    pub fn url_for(&self, project: &str, location: &StoreLocation) -> String {
        self.url_template
            .replace("{root}", &self.root_folder.display().to_string())
            .replace("{project}", project)
            .replace("{host}", location.as_str())
    }
}

#[async_trait]
impl StoreConnector for SqliteStoreConnector {
    async fn connect(
        &self,
        project: &str,
        location: &StoreLocation,
    ) -> Result<Arc<dyn AuthoritativeStore>, StoreError> {
        let url = self.url_for(project, location);
        tracing::debug!(project, url = %url, "Opening authoritative store");

        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&url)
            .await
            .map_err(|e| StoreError::Connect(format!("{}: {}", url, e)))?;

        Ok(Arc::new(SqliteProjectStore::new(pool)))
    }
}

/// Create the `user` table of a project database (development and tests)
pub async fn ensure_user_table(pool: &SqlitePool) -> cohort_common::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user (
            user_id INTEGER PRIMARY KEY,
            user_name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
