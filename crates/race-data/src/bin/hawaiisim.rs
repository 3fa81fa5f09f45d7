//! Runs a simulated race against the event collector.
//!
//! Run with:
//! ```
//! DRY_RUN=true ATH_COUNT=50 SPEED_FACTOR=0 cargo run -p race-data --bin hawaiisim
//! ```

use std::sync::Arc;

use race_data::provider::FileProvider;
use racesim::{EventSink, HttpSink, LogSink, Race, SimConfig};
use tokio::runtime::Handle;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    tracing::info!("Starting HawaiiSim");

    let config = SimConfig::from_env()?;
    let provider = FileProvider::from_config(&config)?;

    let sink: Arc<dyn EventSink> = if config.dry_run {
        tracing::info!("Dry run, events are logged instead of posted");
        Arc::new(LogSink)
    } else {
        tracing::info!("Reporting events to {}", config.api_url);
        Arc::new(HttpSink::new(&config.api_url, &config.api_key, Handle::current()))
    };

    let race = Race::setup(&provider, &config)?;
    tracing::info!(
        "Race {} loaded {} athletes (RACE_SEED={} reproduces it)",
        race.id(),
        race.simulators().len(),
        race.seed()
    );

    let results = tokio::task::spawn_blocking(move || race.run(sink)).await?;

    tracing::info!("Writing race results to {}", config.results_file);
    results.save(&config.results_file)?;
    tracing::info!(
        "Finished list contains {} athletes ({} finishers); {} events delivered, {} retried, {} dropped",
        results.rows.len(),
        results.finishers().count(),
        results.delivery.delivered,
        results.delivery.retried,
        results.delivery.dropped
    );

    Ok(())
}
