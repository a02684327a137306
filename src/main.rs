//! flyerscout - retailer flyer discovery and catalog ingestion.
//!
//! Finds promotional flyer PDFs on retailer websites, validates and stores
//! them, and uploads them with inferred store metadata to a flyer catalog.

mod cli;

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "flyerscout=info"
    } else {
        "flyerscout=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli::run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", console::style("✗").red(), e);
            ExitCode::from(cli::USAGE_EXIT_CODE)
        }
    }
}
