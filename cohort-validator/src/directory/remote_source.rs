//! Directory built from per-shard dblist files fetched over HTTP
//!
//! Each shard `sN` publishes a plain-text list of the projects it hosts, one
//! per line. The merged mapping is cached as JSON so later processes skip the
//! network entirely.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{DirectoryError, DirectorySource, StoreLocation};

const USER_AGENT: &str = concat!("cohort-validator/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RemoteDirectorySource {
    client: reqwest::Client,
    url_template: String,
    shard_count: u32,
    cache_file: Option<PathBuf>,
}

impl RemoteDirectorySource {
    /// `url_template` must contain `{shard}`, replaced by 1..=shard_count
    pub fn new(
        url_template: String,
        shard_count: u32,
        cache_file: Option<PathBuf>,
    ) -> Result<Self, DirectoryError> {
        if !url_template.contains("{shard}") {
            return Err(DirectoryError::Unavailable(format!(
                "dblist URL template has no {{shard}} placeholder: {}",
                url_template
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url_template,
            shard_count,
            cache_file,
        })
    }

    async fn fetch_all(&self) -> Result<HashMap<String, StoreLocation>, DirectoryError> {
        let mut mapping = HashMap::new();

        for shard in 1..=self.shard_count {
            let url = self.url_template.replace("{shard}", &shard.to_string());
            tracing::debug!(url = %url, "Fetching shard dblist");

            let body = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;

            let host = StoreLocation::new(format!("s{}", shard));
            for project in parse_dblist(&body) {
                mapping.insert(project, host.clone());
            }
        }

        if mapping.is_empty() {
            return Err(DirectoryError::Unavailable(
                "every shard dblist was empty".to_string(),
            ));
        }

        Ok(mapping)
    }
}

#[async_trait]
impl DirectorySource for RemoteDirectorySource {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn load(&self, use_cache: bool) -> Result<HashMap<String, StoreLocation>, DirectoryError> {
        if use_cache {
            if let Some(path) = self.cache_file.as_deref().filter(|p| p.exists()) {
                let content = tokio::fs::read_to_string(path).await?;
                let mapping: HashMap<String, StoreLocation> = serde_json::from_str(&content)?;
                tracing::debug!(path = %path.display(), projects = mapping.len(), "Directory read from cache");
                return Ok(mapping);
            }
        }

        let mapping = self.fetch_all().await?;

        if let Some(path) = self.cache_file.as_deref() {
            // Cache write failure only costs a refetch next time
            if let Err(e) = write_cache(path, &mapping).await {
                tracing::warn!(path = %path.display(), error = %e, "Could not write directory cache");
            }
        }

        Ok(mapping)
    }
}

/// Project names in a dblist body (blank lines and `#` comments skipped)
pub(crate) fn parse_dblist(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_lowercase)
        .collect()
}

async fn write_cache(path: &Path, mapping: &HashMap<String, StoreLocation>) -> Result<(), DirectoryError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string(mapping)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Port 9 (discard) on loopback: any attempted fetch fails fast
    const UNREACHABLE: &str = "http://127.0.0.1:9/s{shard}.dblist";

    #[test]
    fn test_parse_dblist_skips_blanks_and_comments() {
        let body = "# shard 1\nenwiki\n\n  simplewiki  \nEnwikiVoyage\n";

        assert_eq!(parse_dblist(body), vec!["enwiki", "simplewiki", "enwikivoyage"]);
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let result = RemoteDirectorySource::new("http://example.org/s1.dblist".into(), 1, None);
        assert!(matches!(result, Err(DirectoryError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_cache_file_used_without_network() {
        let temp_dir = TempDir::new().unwrap();
        let cache = temp_dir.path().join("project_host_map.json");
        std::fs::write(&cache, r#"{"enwiki":"s1","dewiki":"s5"}"#).unwrap();

        let source = RemoteDirectorySource::new(UNREACHABLE.into(), 7, Some(cache)).unwrap();
        let mapping = source.load(true).await.unwrap();

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["dewiki"], StoreLocation::new("s5"));
    }

    #[tokio::test]
    async fn test_bypassing_cache_hits_network() {
        let temp_dir = TempDir::new().unwrap();
        let cache = temp_dir.path().join("project_host_map.json");
        std::fs::write(&cache, r#"{"enwiki":"s1"}"#).unwrap();

        let source = RemoteDirectorySource::new(UNREACHABLE.into(), 1, Some(cache)).unwrap();

        assert!(matches!(source.load(false).await, Err(DirectoryError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_write_cache_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let cache = temp_dir.path().join("sub").join("map.json");
        let mapping = HashMap::from([("frwiki".to_string(), StoreLocation::new("s6"))]);

        write_cache(&cache, &mapping).await.unwrap();

        let source = RemoteDirectorySource::new(UNREACHABLE.into(), 1, Some(cache)).unwrap();
        assert_eq!(source.load(true).await.unwrap(), mapping);
    }
}
