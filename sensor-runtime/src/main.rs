mod batch;
mod clock;
mod config;
mod error;
mod main_loop;
mod orion_client;
mod reconcile;
mod source;
#[cfg(test)]
mod test_utils;
mod weather;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use common::wire::Subscription;
use tracing_subscriber::EnvFilter;

use crate::batch::BatchRunner;
use crate::clock::TokioClock;
use crate::config::RuntimeConfig;
use crate::main_loop::{register_subscription, Scheduler};
use crate::orion_client::OrionClient;
use crate::source::{KindSources, ParkingSource, WeatherSource};
use crate::weather::WeatherClient;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting sensor sync service");

    let entities_file = env::args().nth(1).map(PathBuf::from);
    let config = RuntimeConfig::from_env(entities_file.as_deref())?;

    tracing::info!(
        "Tracking {} entities against {} every {}s",
        config.entities.len(),
        config.orion_url,
        config.interval.as_secs()
    );

    let orion = Arc::new(OrionClient::new(&config.orion_url, config.request_timeout)?);
    let weather = WeatherClient::new(
        &config.weather_url,
        &config.weather_api_key,
        config.request_timeout,
    )?;
    let sources = KindSources::new(
        Box::new(WeatherSource::new(weather)),
        Box::new(ParkingSource::new()),
    );

    register_subscription(
        orion.as_ref(),
        &Subscription::weather_changes(&config.notify_url),
    )
    .await;

    let clock = Arc::new(TokioClock);
    let runner = BatchRunner::new(
        config.entities.into(),
        Arc::new(sources),
        orion,
        clock.clone(),
        config.pacing,
    );
    let scheduler = Scheduler::new(runner, clock, config.interval);

    tokio::select! {
        _ = scheduler.run() => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
            }
            tracing::info!("Received Ctrl-C, shutting down...");
        }
    }

    Ok(())
}
