//! Health command.

use console::style;

use flyerscout::config::Settings;
use flyerscout::models::RunOutcome;
use flyerscout::services::CatalogClient;

pub async fn cmd_health(settings: &Settings) -> anyhow::Result<RunOutcome> {
    let catalog = CatalogClient::new(
        &settings.catalog_url,
        settings.timeouts.api,
        settings.timeouts.upload,
    )?;

    match catalog.health_check().await {
        Ok(()) => {
            println!(
                "{} Catalog reachable at {}",
                style("✓").green(),
                catalog.health_url()
            );
            Ok(RunOutcome::Succeeded)
        }
        Err(e) => {
            println!("{} {}", style("✗").red(), e);
            Ok(RunOutcome::Aborted)
        }
    }
}
