//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod discover;
mod health;
mod ingest;
mod scrape;
mod sites;

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};

use flyerscout::config::{load_settings_with_options, LoadOptions};
use flyerscout::models::RunOutcome;

/// Exit code for invalid usage or configuration.
pub const USAGE_EXIT_CODE: u8 = 4;

#[derive(Parser)]
#[command(name = "flyerscout")]
#[command(about = "Discover retailer flyer PDFs and ingest them into the flyer catalog")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides discovery of ./flyerscout.{toml,json,yaml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory; each site stores its flyers in a subdirectory
    #[arg(long, global = true, env = "FLYERSCOUT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Catalog API prefix, e.g. http://localhost:5000/api
    #[arg(long, global = true, env = "FLYERSCOUT_CATALOG_URL")]
    catalog_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, download and upload flyers from one or more sites
    Scrape {
        /// Site IDs to scrape (can specify multiple, or use --all)
        sites: Vec<String>,
        /// Scrape all configured sites
        #[arg(short, long)]
        all: bool,
        /// Download and store flyers without uploading them
        #[arg(long)]
        no_upload: bool,
        /// Do not probe the catalog before discovery
        #[arg(long)]
        skip_health_check: bool,
    },

    /// List flyer candidates found on a site (does not download)
    Discover {
        /// Site ID
        site: String,
    },

    /// Upload PDFs already on disk to the catalog
    Ingest {
        /// Directory containing the PDFs
        dir: PathBuf,
        /// Site whose defaults and store patterns apply
        #[arg(short, long)]
        site: Option<String>,
        /// Do not probe the catalog first
        #[arg(long)]
        skip_health_check: bool,
    },

    /// Check that the catalog service is reachable
    Health,

    /// List configured sites
    Sites,
}

/// Parse arguments, load configuration and run the command.
/// Returns the process exit code.
pub async fn run() -> anyhow::Result<u8> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print()?;
            return Ok(match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => USAGE_EXIT_CODE,
            });
        }
    };

    let options = LoadOptions {
        config_path: cli.config,
        data_dir: cli.data_dir,
        catalog_url: cli.catalog_url,
    };
    let (settings, config) = load_settings_with_options(options).await?;
    tracing::debug!(
        "Data dir {}, catalog {}",
        settings.data_dir.display(),
        settings.catalog_url
    );

    let outcome: RunOutcome = match cli.command {
        Commands::Scrape {
            sites,
            all,
            no_upload,
            skip_health_check,
        } => {
            scrape::cmd_scrape(&settings, &config, &sites, all, no_upload, skip_health_check)
                .await?
        }
        Commands::Discover { site } => discover::cmd_discover(&settings, &config, &site).await?,
        Commands::Ingest {
            dir,
            site,
            skip_health_check,
        } => {
            ingest::cmd_ingest(&settings, &config, &dir, site.as_deref(), skip_health_check)
                .await?
        }
        Commands::Health => health::cmd_health(&settings).await?,
        Commands::Sites => sites::cmd_sites(&settings, &config)?,
    };

    Ok(outcome.exit_code())
}
