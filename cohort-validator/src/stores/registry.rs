//! Store handle registry
//!
//! Owns the project directory and one shared store handle per canonical
//! project. Handles are opened on first use and released by `close()`.

use cohort_common::config::BootstrapConfig;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{AuthoritativeStore, SqliteStoreConnector, StoreConnector, StoreError};
use crate::directory::{DirectoryError, ProjectDirectory, StoreLocation};

pub struct StoreRegistry {
    directory: ProjectDirectory,
    connector: Box<dyn StoreConnector>,
    handles: RwLock<HashMap<String, Arc<dyn AuthoritativeStore>>>,
}

impl StoreRegistry {
    pub fn new(directory: ProjectDirectory, connector: Box<dyn StoreConnector>) -> Self {
        Self {
            directory,
            connector,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Directory and SQLite connector as configured
    pub fn from_config(config: &BootstrapConfig, root_folder: &Path) -> Result<Self, DirectoryError> {
        let directory = ProjectDirectory::from_config(config, root_folder)?;
        let connector = SqliteStoreConnector::from_config(&config.stores, root_folder);
        Ok(Self::new(directory, Box::new(connector)))
    }

    pub fn directory(&self) -> &ProjectDirectory {
        &self.directory
    }

    /// Shared handle for `project`, connecting on first request
    pub async fn store_for(
        &self,
        project: &str,
        location: &StoreLocation,
    ) -> Result<Arc<dyn AuthoritativeStore>, StoreError> {
        {
            let handles = self.handles.read().await;
            if let Some(store) = handles.get(project) {
                return Ok(Arc::clone(store));
            }
        }

        let mut handles = self.handles.write().await;
        // Another task may have connected while we waited for the write lock
        if let Some(store) = handles.get(project) {
            return Ok(Arc::clone(store));
        }

        let store = self.connector.connect(project, location).await?;
        tracing::info!(project, location = %location, "Authoritative store opened");
        handles.insert(project.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Number of open handles
    pub async fn open_handles(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Close and forget every open handle
    pub async fn close(&self) {
        let drained: Vec<(String, Arc<dyn AuthoritativeStore>)> =
            self.handles.write().await.drain().collect();

        for (project, store) in drained {
            store.close().await;
            tracing::debug!(project = %project, "Authoritative store closed");
        }
    }
}
