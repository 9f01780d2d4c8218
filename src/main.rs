use anyhow::{Context, Result};
use asic_price_monitor::config::Config;
use asic_price_monitor::ingest::run_ingest;
use asic_price_monitor::models::{CanonicalCatalog, CatalogEntry};
use asic_price_monitor::pipeline::{CatalogMatcher, Pipeline};
use asic_price_monitor::sources::{MessageSource, TelegramWebSource};
use asic_price_monitor::storage::{SnapshotOutcome, SqliteStorage, Storage};
use asic_price_monitor::utils;
use chrono::{Local, Utc};
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("asic_price_monitor=info".parse()?),
        )
        .init();

    info!("Starting ASIC Price Monitor");

    let config = Config::load()?;
    if config.channels.is_empty() {
        warn!("No channels configured, every cycle will be empty");
    }

    let pipeline = Pipeline::new(&config.rules, config.pipeline.clone())
        .context("Failed to compile rule tables")?;
    let catalog = CanonicalCatalog::load(&config.catalog_path)?;
    let matcher = CatalogMatcher::new(&catalog, pipeline.rules(), config.pipeline.catalog_match_threshold);

    let storage = SqliteStorage::new(&config.database_path).await?;
    storage.migrate().await?;

    let client = utils::http::create_client(&config.user_agent)?;

    let sources: Vec<Box<dyn MessageSource>> = config
        .channels
        .iter()
        .map(|channel| {
            Box::new(TelegramWebSource::new(channel, config.telegram_base_url.clone(), config.max_retries))
                as Box<dyn MessageSource>
        })
        .collect();

    let mut interval = interval(Duration::from_secs(config.check_interval_seconds));

    loop {
        interval.tick().await;

        info!("--- Starting new check cycle at {} ---", Local::now().format("%Y-%m-%d %H:%M:%S"));

        let run_at = Utc::now();
        let report = run_ingest(&sources, &client, &pipeline, &matcher, config.message_limit, run_at).await;

        if !report.failed_channels.is_empty() {
            error!("{} channel(s) failed: {}", report.failed_channels.len(), report.failed_channels.join(", "));
        }
        info!(
            "Cycle produced {} groups from {} listings in {} messages",
            report.groups.len(),
            report.listings,
            report.messages_seen
        );

        let entries: Vec<CatalogEntry> = report.groups.iter().map(CatalogEntry::from).collect();
        match storage.save_snapshot(run_at, &entries).await {
            Ok(SnapshotOutcome::Stored { id }) => info!("Saved snapshot {}", id),
            Ok(SnapshotOutcome::Unchanged) => info!("No price changes this cycle"),
            Err(e) => error!("Failed to save snapshot: {:#}", e),
        }

        if config.run_once {
            break;
        }
        info!("Check cycle completed, waiting {} seconds", config.check_interval_seconds);
    }

    Ok(())
}
