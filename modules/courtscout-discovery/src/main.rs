use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use courtscout_common::Config;
use courtscout_discovery::{
    Deduplicator, DiscoveryJobProcessor, DiscoveryRunner, DiscoveryScheduler, JobQueue,
    QueueConfig, SearchAreaTracker,
};
use courtscout_store::{migrate, PgCourtStore, PgSearchAreaStore};
use places_client::PlacesClient;

/// Targets our crates actually log under. EnvFilter matches whole path
/// segments, so a bare `courtscout` prefix would match none of them.
const LOG_TARGETS: [&str; 4] = [
    "courtscout_discovery",
    "courtscout_store",
    "courtscout_common",
    "places_client",
];

/// Info-level logging for our own crates; RUST_LOG still overrides.
fn default_log_filter() -> Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env();
    for target in LOG_TARGETS {
        filter = filter.add_directive(format!("{target}=info").parse()?);
    }
    Ok(filter)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_env_filter(default_log_filter()?).init();

    info!("CourtScout discovery starting...");

    // Load config
    let config = Config::from_env();
    config.log_redacted();

    // Connect to Postgres
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    // Run migrations
    migrate(&pool).await?;

    // Wire the pipeline
    let places = Arc::new(PlacesClient::new(config.google_places_api_key.clone()));
    if !places.is_configured() {
        info!("No places API key configured; discovery jobs will fail fast until one is set");
    }
    let courts = Arc::new(PgCourtStore::new(pool.clone()));
    let areas = Arc::new(PgSearchAreaStore::new(pool));

    let runner = DiscoveryRunner::new(
        places,
        Deduplicator::new(courts),
        SearchAreaTracker::new(areas.clone()),
    );

    let queue = Arc::new(JobQueue::new(QueueConfig {
        concurrency: config.worker_concurrency,
        max_attempts: config.job_max_attempts,
        backoff_base: Duration::from_secs(config.job_backoff_base_secs),
        ..QueueConfig::default()
    }));
    queue.start(Arc::new(DiscoveryJobProcessor::new(runner)));

    let tracker = Arc::new(SearchAreaTracker::new(areas));
    let scheduler = Arc::new(DiscoveryScheduler::new(queue.clone(), tracker));
    scheduler.start();

    info!("Discovery pipeline running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received");
    scheduler.stop();
    queue.shutdown().await;
    info!("CourtScout discovery stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_every_crate_target() {
        let rendered = default_log_filter().expect("directives parse").to_string();
        for target in LOG_TARGETS {
            assert!(rendered.contains(target), "no directive for {target}: {rendered}");
        }
    }
}
