//! Fixed, configuration-supplied directory (development, tests, offline)

use async_trait::async_trait;
use cohort_common::config::DirectoryConfig;
use std::collections::HashMap;

use super::{DirectoryError, DirectorySource, StoreLocation};

pub struct StaticDirectorySource {
    mapping: HashMap<String, StoreLocation>,
}

impl StaticDirectorySource {
    /// Every project maps to the same host
    pub fn new<I, S>(projects: I, host: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mapping = projects
            .into_iter()
            .map(|p| (p.into(), StoreLocation::new(host)))
            .collect();
        Self { mapping }
    }

    /// Configured projects on `default_host`, with per-project overrides
    pub fn from_config(config: &DirectoryConfig) -> Self {
        let mut mapping: HashMap<String, StoreLocation> = config
            .projects
            .iter()
            .map(|p| (p.trim().to_lowercase(), StoreLocation::new(&config.default_host)))
            .collect();
        for (project, host) in &config.hosts {
            mapping.insert(project.trim().to_lowercase(), StoreLocation::new(host));
        }
        Self { mapping }
    }
}

#[async_trait]
impl DirectorySource for StaticDirectorySource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn load(&self, _use_cache: bool) -> Result<HashMap<String, StoreLocation>, DirectoryError> {
        Ok(self.mapping.clone())
    }
}
