use std::error::Error;
use std::sync::Arc;

use offsched_mock::run;
use offsched_mock::settings::Settings;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let settings = Arc::new(Settings::new()?);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = settings.logger.level.as_str();
        let app_name = env!("CARGO_PKG_NAME").replace('-', "_");

        EnvFilter::new(format!("{app_name}={level},offsched_engine={level}"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Simulating {}", settings.device.name);
    let report = run(&settings)
        .await
        .inspect_err(|err| tracing::error!("Mock device failed: {}", err))?;
    tracing::info!(
        "{} events scheduled, {} migrated, enabled: {}",
        report.events.len(),
        report.migrated,
        report.enabled
    );
    Ok(())
}
