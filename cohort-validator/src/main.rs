//! cohort-validator - command-line entry point
//!
//! Creates cohorts from parsed uploads, validates them against each project's
//! authoritative user table, and reports validation status.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cohort_common::config::{load_config, ConfigSource, RootFolderResolver};
use cohort_common::db::{init_database, NewCohort, UploadRecord};
use cohort_validator::db::cohorts;
use cohort_validator::models::ValidationState;
use cohort_validator::services::{OrchestratorSettings, ValidationOrchestrator};
use cohort_validator::stores::StoreRegistry;
use cohort_validator::ValidationQueue;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for cohort-validator
#[derive(Parser, Debug)]
#[command(name = "cohort-validator")]
#[command(about = "Validate uploaded cohorts against per-project user tables")]
#[command(version)]
struct Args {
    /// Bootstrap TOML file (defaults to the platform config directory)
    #[arg(short, long, env = "COHORT_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the metadata store and project stores
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the metadata store
    Init,

    /// Create a cohort from a JSON array of {"username", "project"} records
    Create {
        #[arg(long)]
        name: String,

        /// Default project for records that name none
        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Records hold numeric user ids rather than user names
        #[arg(long)]
        by_user_id: bool,

        #[arg(long)]
        records: PathBuf,
    },

    /// Validate a cohort and wait for the result (Ctrl+C cancels at the next batch)
    Validate {
        #[arg(long)]
        cohort: i64,
    },

    /// Show a cohort's validation progress
    Status {
        #[arg(long)]
        cohort: i64,
    },

    /// List the project directory
    Projects {
        /// Bypass the directory cache and refetch
        #[arg(long)]
        refresh: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let config = loaded.config;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match &loaded.source {
        ConfigSource::File(path) => info!("Configuration: {}", path.display()),
        ConfigSource::Defaults => warn!("No configuration file found, using defaults"),
    }

    let root_folder = RootFolderResolver::new(args.root_folder.as_deref(), &config).resolve();
    let db_path = config.database_path(&root_folder);
    info!("Root folder: {}", root_folder.display());
    info!("Database: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to open metadata store")?;

    match args.command {
        Command::Init => {
            info!("Metadata store ready");
        }

        Command::Create {
            name,
            project,
            description,
            by_user_id,
            records,
        } => {
            let upload = read_records(&records)?;
            let cohort = cohorts::create_cohort_from_upload(
                &pool,
                &NewCohort {
                    name,
                    description,
                    default_project: project,
                    validate_as_user_ids: by_user_id,
                },
                &upload,
                config.validation.max_lock_wait_ms,
            )
            .await
            .context("Failed to create cohort")?;

            println!("{}", serde_json::to_string_pretty(&cohort)?);
        }

        Command::Validate { cohort } => {
            let registry = Arc::new(StoreRegistry::from_config(&config, &root_folder)?);
            let orchestrator = ValidationOrchestrator::new(
                pool.clone(),
                Arc::clone(&registry),
                OrchestratorSettings::from(&config.validation),
            );
            let queue = ValidationQueue::new(Arc::new(orchestrator));

            let token = queue.submit(cohort).await?;
            info!(cohort_id = cohort, run_token = %token, "Waiting for validation run");

            let status = tokio::select! {
                status = queue.wait(token) => status?,
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, cancelling at the next batch boundary");
                    queue.cancel(token).await?;
                    queue.wait(token).await?
                }
            };

            registry.close().await;

            match (status.state, status.report) {
                (ValidationState::Committed, Some(report)) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                (ValidationState::Cancelled, _) => bail!("Validation of cohort {} cancelled", cohort),
                _ => bail!(
                    "Validation of cohort {} failed: {}",
                    cohort,
                    status.error.unwrap_or_else(|| "unknown error".to_string())
                ),
            }
        }

        Command::Status { cohort } => {
            let status = cohorts::cohort_status(&pool, cohort).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Command::Projects { refresh } => {
            let registry = StoreRegistry::from_config(&config, &root_folder)?;
            let directory = if refresh {
                registry.directory().refresh(false).await?
            } else {
                registry.directory().snapshot().await?
            };

            let mut projects: Vec<_> = directory.iter().collect();
            projects.sort_by(|a, b| a.0.cmp(b.0));
            for (project, location) in projects {
                println!("{}\t{}", project, location);
            }
        }
    }

    pool.close().await;
    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<UploadRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read records file {}", path.display()))?;
    let records: Vec<UploadRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Records file {} is not a JSON array of records", path.display()))?;
    Ok(records)
}
