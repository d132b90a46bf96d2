//! CLI for the VARC media archiver.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use varc_core::config;
use varc_core::state_db::StateDb;

use commands::{run_cleanup, run_ingest, run_status, run_verify};

/// Top-level CLI for the VARC media archiver.
#[derive(Debug, Parser)]
#[command(name = "varc")]
#[command(about = "VARC: resumable, quota-aware media archiver", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run ingestion over batches of feed pages.
    Run {
        /// Feed file mapping page numbers to item arrays.
        #[arg(long, value_name = "FILE")]
        feed: PathBuf,
        /// Page to start the descending traversal at (default: resume from
        /// the cursor, or the feed's highest page on a first run).
        #[arg(long, value_name = "PAGE")]
        start_page: Option<u64>,
        /// Number of batches to process.
        #[arg(long, default_value = "1", value_name = "N")]
        batches: u32,
        /// Pages per batch (default from config).
        #[arg(long, value_name = "M")]
        pages: Option<u32>,
        /// Re-offer items that permanently failed in earlier runs.
        #[arg(long)]
        retry_failed: bool,
        /// Override the configured storage root.
        #[arg(long, value_name = "DIR")]
        storage_root: Option<PathBuf>,
    },

    /// Show progress, ledger counts, and quota usage.
    Status,

    /// Validation-only scan of existing bundles (no downloads, no changes).
    Verify {
        /// Override the configured storage root.
        #[arg(long, value_name = "DIR")]
        storage_root: Option<PathBuf>,
    },

    /// Delete incomplete bundle directories and stale staging files.
    Cleanup {
        /// Override the configured storage root.
        #[arg(long, value_name = "DIR")]
        storage_root: Option<PathBuf>,
    },
}

impl CliCommand {
    /// Returns the process exit code (0 normal, 2 quota-stopped).
    pub async fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                feed,
                start_page,
                batches,
                pages,
                retry_failed,
                storage_root,
            } => {
                if let Some(root) = storage_root {
                    cfg.storage_root = root;
                }
                let db = StateDb::open_default().await?;
                run_ingest(&db, &cfg, &feed, start_page, batches, pages, retry_failed).await
            }
            CliCommand::Status => {
                let db = StateDb::open_default().await?;
                run_status(&db, &cfg).await?;
                Ok(0)
            }
            CliCommand::Verify { storage_root } => {
                if let Some(root) = storage_root {
                    cfg.storage_root = root;
                }
                run_verify(&cfg)?;
                Ok(0)
            }
            CliCommand::Cleanup { storage_root } => {
                if let Some(root) = storage_root {
                    cfg.storage_root = root;
                }
                run_cleanup(&cfg)?;
                Ok(0)
            }
        }
    }
}
