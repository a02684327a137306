//! Sites command: list configured site profiles.

use console::style;

use flyerscout::config::{Config, Settings};
use flyerscout::models::RunOutcome;

use crate::cli::helpers::truncate;

pub fn cmd_sites(settings: &Settings, config: &Config) -> anyhow::Result<RunOutcome> {
    let profiles = config.site_profiles(settings)?;

    println!("\n{}", style("Flyer sites").bold());
    println!("{}", "-".repeat(78));
    println!("{:<16} {:<22} {:<7} {:<8} Seed", "ID", "Store", "CAP", "Delay");
    println!("{}", "-".repeat(78));

    for profile in &profiles {
        let origin = if config.sites.contains_key(&profile.id) {
            style("*").cyan().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{:<16} {:<22} {:<7} {:<8} {}{}",
            profile.id,
            truncate(profile.default_store.as_deref().unwrap_or("(inferred)"), 21),
            profile.default_cap.as_deref().unwrap_or("-"),
            format!("{}ms", profile.request_delay.as_millis()),
            truncate(profile.seeds.first().map(String::as_str).unwrap_or(""), 40),
            origin
        );
    }

    if let Some(ref path) = config.source_path {
        if !config.sites.is_empty() {
            println!("\n{} defined in {}", style("*").cyan(), path.display());
        }
    }

    Ok(RunOutcome::Succeeded)
}
