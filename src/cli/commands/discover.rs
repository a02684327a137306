//! Discover command: list candidates without downloading.

use console::style;

use flyerscout::config::{Config, Settings};
use flyerscout::models::RunOutcome;
use flyerscout::services::{Pipeline, PipelineOptions};

use crate::cli::helpers::truncate;

pub async fn cmd_discover(settings: &Settings, config: &Config, site_id: &str) -> anyhow::Result<RunOutcome> {
    let profile = config.site_profile(site_id, settings)?;
    let seeds = profile.seeds.len();
    let mut pipeline = Pipeline::new(profile, settings, PipelineOptions::download_only())?;

    println!(
        "{} Discovering flyers on {} ({} seed page{})",
        style("→").cyan(),
        site_id,
        seeds,
        if seeds == 1 { "" } else { "s" }
    );

    let (candidates, stats) = match pipeline.discover_only().await {
        Ok(found) => found,
        Err(e) => {
            println!("{} {}", style("✗").red(), e);
            return Ok(RunOutcome::Aborted);
        }
    };

    if candidates.is_empty() {
        println!("{} No flyer candidates found", style("!").yellow());
    } else {
        println!("{:<16} {}", "STRATEGY", "URL");
        for candidate in &candidates {
            println!(
                "{:<16} {}",
                style(candidate.strategy.as_str()).dim(),
                truncate(&candidate.url, 120)
            );
        }
        println!(
            "\n{} {} candidate{}",
            style("✓").green(),
            candidates.len(),
            if candidates.len() == 1 { "" } else { "s" }
        );
    }

    for entry in &stats.error_log {
        println!("  {} {}", style("!").yellow(), entry.message);
    }

    Ok(if candidates.is_empty() {
        RunOutcome::NothingFound
    } else if stats.errors > 0 {
        RunOutcome::Partial
    } else {
        RunOutcome::Succeeded
    })
}
