//! Runs one ingestion pass for the configured station and prints the results.

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use weather_pipeline::{run_once, AppConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let station_id = &config.pipeline.station_id;
    let report = run_once(&config)
        .await
        .with_context(|| format!("Pipeline run for station {station_id} failed"))?;

    println!("{report}");
    Ok(())
}
