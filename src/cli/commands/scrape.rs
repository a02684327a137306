//! Scrape command: the full pipeline for one or more sites.

use std::time::Instant;

use console::style;
use tokio::sync::{mpsc, watch};

use flyerscout::config::{Config, Settings};
use flyerscout::models::{RunOutcome, RunStats};
use flyerscout::services::{Pipeline, PipelineEvent, PipelineOptions};
use flyerscout::utils::format_duration;

use crate::cli::helpers::{print_report, resolve_sites};
use crate::cli::progress::RunProgress;

/// Scrape sites one after another. Ctrl-C stops the current site, which
/// still writes its run record, and skips the rest.
pub async fn cmd_scrape(
    settings: &Settings,
    config: &Config,
    site_ids: &[String],
    all: bool,
    no_upload: bool,
    skip_health_check: bool,
) -> anyhow::Result<RunOutcome> {
    let profiles = resolve_sites(config, settings, site_ids, all)?;

    let mut options = if no_upload {
        PipelineOptions::download_only()
    } else {
        PipelineOptions::from_settings(settings)
    };
    if skip_health_check {
        options.health_check = false;
    }

    let (interrupt_tx, interrupt_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(true);
        }
    });

    println!(
        "{} Scraping {} site{}{}",
        style("→").cyan(),
        profiles.len(),
        if profiles.len() == 1 { "" } else { "s" },
        if no_upload { " (download only)" } else { "" }
    );

    let mut worst = RunOutcome::Succeeded;
    let mut totals = RunStats::new();
    let site_count = profiles.len();

    for profile in profiles {
        if *interrupt_rx.borrow() {
            println!("{} Interrupted, skipping {}", style("!").yellow(), profile.id);
            worst = worst.worst(RunOutcome::Aborted);
            continue;
        }

        let site = profile.id.clone();
        let (event_tx, mut event_rx) = mpsc::channel::<PipelineEvent>(100);
        let pipeline = Pipeline::new(profile, settings, options)?.with_events(event_tx);

        let display_site = site.clone();
        let event_handler = tokio::spawn(async move {
            let mut progress = RunProgress::new(&display_site);
            while let Some(event) = event_rx.recv().await {
                progress.handle(event);
            }
            progress.finish();
        });

        let mut rx = interrupt_rx.clone();
        let shutdown = async move {
            // A closed channel means no handler is installed: never interrupt.
            if rx.wait_for(|interrupted| *interrupted).await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        let started = Instant::now();
        let report = pipeline.run_with_shutdown(shutdown).await;

        if let Err(e) = event_handler.await {
            tracing::warn!("Progress task for {} failed: {}", site, e);
        }

        print_report(&report);
        println!("  {} {}", style("took").dim(), format_duration(started.elapsed()));
        totals.merge(&report.stats);
        worst = worst.worst(report.outcome());
    }

    if site_count > 1 {
        println!(
            "\n{} {} sites: uploaded {}, duplicates {}, errors {}",
            style("Σ").cyan(),
            site_count,
            totals.uploaded,
            totals.duplicates,
            totals.errors
        );
    }

    Ok(worst)
}
