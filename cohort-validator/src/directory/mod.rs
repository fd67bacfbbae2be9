//! Project Directory
//!
//! Cached mapping from canonical project name to the location of that
//! project's authoritative store. Populated lazily on first use; a refresh
//! can bypass the cache. Refreshes are single-flight: callers arriving while a
//! load is in progress wait for it instead of starting their own.

mod remote_source;
mod static_source;

pub use remote_source::RemoteDirectorySource;
pub use static_source::StaticDirectorySource;

use async_trait::async_trait;
use cohort_common::config::{BootstrapConfig, DirectoryMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Backing store location for a project (a host or shard name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreLocation(pub String);

impl StoreLocation {
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable directory snapshot; one validation run uses one snapshot
pub type ProjectMap = Arc<HashMap<String, StoreLocation>>;

/// Directory loading errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Cache file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Provider of the full project → location mapping
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Load the mapping; `use_cache = false` bypasses any provider-side cache
    async fn load(&self, use_cache: bool) -> Result<HashMap<String, StoreLocation>, DirectoryError>;
}

/// Cached, refreshable project directory
pub struct ProjectDirectory {
    source: Box<dyn DirectorySource>,
    cached: Mutex<Option<ProjectMap>>,
}

impl ProjectDirectory {
    pub fn new(source: Box<dyn DirectorySource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// Build from bootstrap configuration
    ///
    /// Static mode serves the configured list; remote mode fetches shard
    /// dblists and caches them under the root folder.
    pub fn from_config(config: &BootstrapConfig, root_folder: &Path) -> Result<Self, DirectoryError> {
        let source: Box<dyn DirectorySource> = match config.directory.mode {
            DirectoryMode::Static => Box::new(StaticDirectorySource::from_config(&config.directory)),
            DirectoryMode::Remote => Box::new(RemoteDirectorySource::new(
                config.directory.dblist_url_template.clone(),
                config.directory.shard_count,
                Some(config.directory_cache_path(root_folder)),
            )?),
        };
        Ok(Self::new(source))
    }

    /// Current mapping, loading it on first use
    pub async fn snapshot(&self) -> Result<ProjectMap, DirectoryError> {
        self.load(true).await
    }

    /// Reload the mapping; `use_cache = false` forces the source to refetch
    pub async fn refresh(&self, use_cache: bool) -> Result<ProjectMap, DirectoryError> {
        self.load(use_cache).await
    }

    /// Location for one canonical project name
    pub async fn lookup(&self, project: &str) -> Result<Option<StoreLocation>, DirectoryError> {
        Ok(self.snapshot().await?.get(project).cloned())
    }

    async fn load(&self, use_cache: bool) -> Result<ProjectMap, DirectoryError> {
        // Held across the fetch: concurrent callers queue behind the in-flight load
        let mut cached = self.cached.lock().await;

        if use_cache {
            if let Some(map) = cached.as_ref() {
                return Ok(Arc::clone(map));
            }
        }

        let mapping = self.source.load(use_cache).await?;
        tracing::info!(
            source = self.source.name(),
            projects = mapping.len(),
            use_cache,
            "Project directory loaded"
        );

        let map: ProjectMap = Arc::new(mapping);
        *cached = Some(Arc::clone(&map));
        Ok(map)
    }
}
