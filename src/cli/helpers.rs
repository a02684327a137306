//! Shared helper functions for CLI commands.

use console::style;

use flyerscout::config::{Config, Settings};
use flyerscout::models::{RunOutcome, RunState};
use flyerscout::scrapers::SiteProfile;
use flyerscout::services::RunReport;

/// Resolve site ids (or every site with `all`) into profiles.
pub fn resolve_sites(
    config: &Config,
    settings: &Settings,
    ids: &[String],
    all: bool,
) -> anyhow::Result<Vec<SiteProfile>> {
    if all {
        return Ok(config.site_profiles(settings)?);
    }
    if ids.is_empty() {
        let available: Vec<String> = config.site_configs().into_keys().collect();
        anyhow::bail!(
            "no sites specified; use --all or one of: {}",
            available.join(", ")
        );
    }
    ids.iter()
        .map(|id| config.site_profile(id, settings).map_err(Into::into))
        .collect()
}

/// Truncate a string for column display.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Print the end-of-run summary for one site.
pub fn print_report(report: &RunReport) {
    let stats = &report.stats;
    let marker = match report.outcome() {
        RunOutcome::Succeeded => style("✓").green(),
        RunOutcome::Partial => style("!").yellow(),
        RunOutcome::NothingFound => style("○").dim(),
        RunOutcome::Aborted => style("✗").red(),
    };

    println!(
        "{} {} {}",
        marker,
        style(&report.site).bold(),
        style(format!("({})", report.state)).dim()
    );
    println!(
        "  found {}  downloaded {}  skipped {}  uploaded {}  duplicates {}  errors {}",
        stats.found,
        stats.downloaded,
        stats.skipped,
        style(stats.uploaded).green(),
        stats.duplicates,
        if stats.errors > 0 {
            style(stats.errors).red()
        } else {
            style(stats.errors)
        }
    );

    if let Some(ref fatal) = report.fatal {
        println!("  {} {}", style("✗").red(), fatal);
    }
    if report.state != RunState::Aborted {
        for entry in report.stats.error_log.iter().take(5) {
            println!("  {} {}", style("→").dim(), truncate(&entry.message, 100));
        }
        if report.stats.error_log.len() > 5 {
            println!(
                "  {} {} more in the run record",
                style("→").dim(),
                report.stats.error_log.len() - 5
            );
        }
    }
    if let Some(ref path) = report.record_path {
        println!("  {} {}", style("stats:").dim(), path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("volantino", 20), "volantino");
        assert_eq!(truncate("volantino-settimanale.pdf", 12), "volantino...");
        assert_eq!(truncate("decò decò decò", 7), "decò...");
    }

    #[test]
    fn test_resolve_sites() {
        let config = Config::default();
        let settings = Settings::default();

        assert!(resolve_sites(&config, &settings, &[], false).is_err());
        assert!(resolve_sites(&config, &settings, &["nope".into()], false).is_err());

        let picked = resolve_sites(&config, &settings, &["md".into(), "lidl".into()], false).unwrap();
        let ids: Vec<&str> = picked.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["md", "lidl"]);

        let all = resolve_sites(&config, &settings, &[], true).unwrap();
        assert_eq!(all.len(), 7);
    }
}
