//! Ingest command: upload flyers already on disk.

use std::path::Path;

use console::style;

use flyerscout::config::{Config, Settings};
use flyerscout::models::RunOutcome;
use flyerscout::services::ingest_directory;

use crate::cli::helpers::print_report;

pub async fn cmd_ingest(
    settings: &Settings,
    config: &Config,
    dir: &Path,
    site_id: Option<&str>,
    skip_health_check: bool,
) -> anyhow::Result<RunOutcome> {
    let profile = site_id
        .map(|id| config.site_profile(id, settings))
        .transpose()?;

    println!(
        "{} Uploading PDFs from {} to {}",
        style("→").cyan(),
        dir.display(),
        settings.catalog_url
    );

    let health_check = settings.health_check && !skip_health_check;
    let report = ingest_directory(dir, profile.as_ref(), settings, health_check).await?;
    print_report(&report);
    Ok(report.outcome())
}
