//! Bootstrap configuration and root folder resolution
//!
//! Configuration is TOML-only and read once at startup. Every field has a
//! compiled default so a missing file never prevents the tool from running.
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. `COHORT_ROOT_FOLDER` environment variable
//! 3. TOML `root_folder`
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "COHORT_ROOT_FOLDER";

/// Name of the local metadata store file inside the root folder
pub const DEFAULT_DATABASE_FILE: &str = "cohorts.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Root folder holding the metadata store and project stores
    pub root_folder: Option<PathBuf>,

    /// Explicit metadata store path (defaults to `<root>/cohorts.db`)
    pub database_path: Option<PathBuf>,

    pub logging: LoggingConfig,
    pub directory: DirectoryConfig,
    pub stores: StoreConfig,
    pub validation: ValidationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Where the project directory comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryMode {
    /// Fixed mapping from this file (development, tests, offline hosts)
    #[default]
    Static,
    /// Shard dblists fetched over HTTP and cached on disk
    Remote,
}

/// Project directory configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub mode: DirectoryMode,

    /// Static mode: canonical project names
    #[serde(default)]
    pub projects: Vec<String>,

    /// Static mode: per-project host overrides
    #[serde(default)]
    pub hosts: BTreeMap<String, String>,

    /// Static mode: host assigned to projects without an override
    #[serde(default = "default_static_host")]
    pub default_host: String,

    /// Remote mode: dblist URL, `{shard}` is replaced by 1..=shard_count
    #[serde(default = "default_dblist_url_template")]
    pub dblist_url_template: String,

    /// Remote mode: number of database shards
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,

    /// Remote mode: on-disk cache (relative paths resolve against the root folder)
    #[serde(default = "default_directory_cache_file")]
    pub cache_file: PathBuf,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            mode: DirectoryMode::default(),
            projects: Vec::new(),
            hosts: BTreeMap::new(),
            default_host: default_static_host(),
            dblist_url_template: default_dblist_url_template(),
            shard_count: default_shard_count(),
            cache_file: default_directory_cache_file(),
        }
    }
}

/// Authoritative store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Connection URL; `{root}`, `{project}` and `{host}` are substituted
    #[serde(default = "default_store_url_template")]
    pub url_template: String,

    /// Pool size per project store
    #[serde(default = "default_store_max_connections")]
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url_template: default_store_url_template(),
            max_connections: default_store_max_connections(),
        }
    }
}

/// Validation pipeline tuning
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Maximum candidates per authoritative store query
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Suffix appended once when a project name is not found as typed
    #[serde(default = "default_project_suffix")]
    pub project_suffix: String,

    /// Upper bound on retrying writes that hit SQLite lock contention
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            project_suffix: default_project_suffix(),
            max_lock_wait_ms: default_max_lock_wait_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_static_host() -> String {
    "localhost".to_string()
}

fn default_dblist_url_template() -> String {
    "https://noc.wikimedia.org/conf/s{shard}.dblist".to_string()
}

fn default_shard_count() -> u32 {
    7
}

fn default_directory_cache_file() -> PathBuf {
    PathBuf::from("project_host_map.json")
}

fn default_store_url_template() -> String {
    "sqlite://{root}/projects/{project}.db?mode=ro".to_string()
}

fn default_store_max_connections() -> u32 {
    4
}

fn default_batch_size() -> usize {
    999
}

fn default_project_suffix() -> String {
    "wiki".to_string()
}

fn default_max_lock_wait_ms() -> u64 {
    5000
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file found; compiled defaults in effect
    Defaults,
}

/// Configuration plus its provenance, so callers can log it once tracing is up
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BootstrapConfig,
    pub source: ConfigSource,
}

impl BootstrapConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BootstrapConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.validation.batch_size == 0 {
            return Err(Error::Config("validation.batch_size must be at least 1".to_string()));
        }
        if self.stores.max_connections == 0 {
            return Err(Error::Config("stores.max_connections must be at least 1".to_string()));
        }
        if self.directory.mode == DirectoryMode::Remote && self.directory.shard_count == 0 {
            return Err(Error::Config("directory.shard_count must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Metadata store path for a resolved root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root_folder.join(path),
            None => root_folder.join(DEFAULT_DATABASE_FILE),
        }
    }

    /// Directory cache path for a resolved root folder
    pub fn directory_cache_path(&self, root_folder: &Path) -> PathBuf {
        if self.directory.cache_file.is_absolute() {
            self.directory.cache_file.clone()
        } else {
            root_folder.join(&self.directory.cache_file)
        }
    }
}

/// Load bootstrap configuration
///
/// An explicitly requested file must exist. Without one, the platform config
/// file is used when present, otherwise compiled defaults.
pub fn load_config(explicit_path: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!("Config file not found: {}", path.display())));
            }
            Some(path.to_path_buf())
        }
        None => default_config_path().filter(|p| p.exists()),
    };

    match path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
            let config = BootstrapConfig::from_toml_str(&content)?;
            Ok(LoadedConfig {
                config,
                source: ConfigSource::File(path),
            })
        }
        None => Ok(LoadedConfig {
            config: BootstrapConfig::default(),
            source: ConfigSource::Defaults,
        }),
    }
}

/// Platform config file location (`~/.config/cohort-validator/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cohort-validator").join("config.toml"))
}

/// Resolves the root folder following the documented priority order
pub struct RootFolderResolver<'a> {
    cli_arg: Option<&'a Path>,
    config: &'a BootstrapConfig,
}

impl<'a> RootFolderResolver<'a> {
    pub fn new(cli_arg: Option<&'a Path>, config: &'a BootstrapConfig) -> Self {
        Self { cli_arg, config }
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = self.cli_arg {
            return path.to_path_buf();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.config.root_folder {
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        default_root_folder()
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cohort-validator"))
        .unwrap_or_else(|| PathBuf::from("./cohort_data"))
}
