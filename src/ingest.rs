use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Client;
use tracing::{error, info};

use crate::models::{AggregatedGroup, RawMessage};
use crate::pipeline::{CatalogMatcher, Pipeline};
use crate::sources::MessageSource;

/// Outcome of one ingest cycle across every configured channel.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub groups: Vec<AggregatedGroup>,
    pub messages_seen: usize,
    pub listings: usize,
    /// Channels whose fetch failed; their messages are absent from `groups`.
    pub failed_channels: Vec<String>,
}

/// Fetch all channels concurrently, then run the collected messages through
/// the pipeline in channel order and backfill power from the catalog.
pub async fn run_ingest(
    sources: &[Box<dyn MessageSource>],
    client: &Client,
    pipeline: &Pipeline,
    matcher: &CatalogMatcher,
    limit: usize,
    now: DateTime<Utc>,
) -> IngestReport {
    // Titles are read after the fetch; a scraped title only exists then.
    let fetches = sources.iter().map(|source| async move {
        let result = source.fetch(client, limit).await;
        (source.channel_title().to_string(), result)
    });
    let results = join_all(fetches).await;

    let mut messages: Vec<RawMessage> = Vec::new();
    let mut failed_channels = Vec::new();
    for (title, result) in results {
        match result {
            Ok(fetched) => {
                info!("Fetched {} messages from {}", fetched.len(), title);
                messages.extend(fetched);
            }
            Err(e) => {
                error!("Failed to fetch {}: {}", title, e);
                failed_channels.push(title);
            }
        }
    }

    let run = pipeline.run(&messages, now);
    let mut groups = run.groups;
    matcher.enrich(&mut groups);

    IngestReport {
        groups,
        messages_seen: messages.len(),
        listings: run.listing_count,
        failed_channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineSettings, RuleTables};
    use crate::error::SourceError;
    use crate::models::{CanonicalCatalog, CanonicalSpec, PowerSource};
    use crate::utils::http::create_client;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use once_cell::sync::OnceCell;

    struct StaticSource {
        title: &'static str,
        messages: Vec<RawMessage>,
    }

    #[async_trait]
    impl MessageSource for StaticSource {
        async fn fetch(&self, _client: &Client, limit: usize) -> Result<Vec<RawMessage>, SourceError> {
            Ok(self.messages.iter().take(limit).cloned().collect())
        }

        fn channel_title(&self) -> &str {
            self.title
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MessageSource for FailingSource {
        async fn fetch(&self, _client: &Client, _limit: usize) -> Result<Vec<RawMessage>, SourceError> {
            Err(SourceError::EmptyPage {
                channel: "gone".to_string(),
            })
        }

        fn channel_title(&self) -> &str {
            "Gone Channel"
        }
    }

    /// Learns its title from the page it fetches, like a scraped channel.
    struct SelfNamingSource {
        scraped_title: OnceCell<String>,
        messages: Vec<RawMessage>,
    }

    #[async_trait]
    impl MessageSource for SelfNamingSource {
        async fn fetch(&self, _client: &Client, _limit: usize) -> Result<Vec<RawMessage>, SourceError> {
            let _ = self.scraped_title.set("Shenzhen Miners".to_string());
            if self.messages.is_empty() {
                return Err(SourceError::EmptyPage {
                    channel: "shenzhen_miners".to_string(),
                });
            }
            Ok(self.messages.clone())
        }

        fn channel_title(&self) -> &str {
            self.scraped_title.get().map_or("shenzhen_miners", String::as_str)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(&RuleTables::default(), PipelineSettings::default()).unwrap()
    }

    fn matcher(pipeline: &Pipeline) -> CatalogMatcher {
        let catalog = CanonicalCatalog::new(vec![CanonicalSpec {
            name: "Antminer S21".to_string(),
            hashrate_th: 200.0,
            power_watts: 3500,
        }]);
        CatalogMatcher::new(&catalog, pipeline.rules(), 0.92)
    }

    #[tokio::test]
    async fn failing_channel_does_not_poison_the_run() {
        let sources: Vec<Box<dyn MessageSource>> = vec![
            Box::new(StaticSource {
                title: "VendorX",
                messages: vec![RawMessage::new("VendorX", "S21 200T $3000", now() - Duration::hours(1))],
            }),
            Box::new(FailingSource),
            Box::new(StaticSource {
                title: "VendorY",
                messages: vec![RawMessage::new("VendorY", "S21 200T $3200", now() - Duration::hours(2))],
            }),
        ];
        let pipeline = pipeline();
        let client = create_client("test-agent").unwrap();

        let report = run_ingest(&sources, &client, &pipeline, &matcher(&pipeline), 100, now()).await;

        assert_eq!(report.failed_channels, vec!["Gone Channel".to_string()]);
        assert_eq!(report.messages_seen, 2);
        assert_eq!(report.listings, 2);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].stats.count, 2);
        assert_eq!(report.groups[0].price(), 3100);
    }

    #[tokio::test]
    async fn groups_without_parsed_power_are_enriched() {
        let sources: Vec<Box<dyn MessageSource>> = vec![Box::new(StaticSource {
            title: "VendorX",
            messages: vec![RawMessage::new(
                "VendorX",
                "S21 200T $3000\nS21 XP 270T 23.6u/t",
                now() - Duration::hours(1),
            )],
        })];
        let pipeline = pipeline();
        let client = create_client("test-agent").unwrap();

        let report = run_ingest(&sources, &client, &pipeline, &matcher(&pipeline), 100, now()).await;

        let power: Vec<(&str, Option<u32>, PowerSource)> = report
            .groups
            .iter()
            .map(|g| (g.display_name.as_str(), g.power_watts, g.power_source))
            .collect();
        assert_eq!(
            power,
            vec![
                ("Antminer S21", Some(3500), PowerSource::Catalog),
                ("Antminer S21 XP", None, PowerSource::Estimated),
            ]
        );
    }

    #[tokio::test]
    async fn failed_channel_is_reported_under_its_fetched_title() {
        let sources: Vec<Box<dyn MessageSource>> = vec![Box::new(SelfNamingSource {
            scraped_title: OnceCell::new(),
            messages: Vec::new(),
        })];
        let pipeline = pipeline();
        let client = create_client("test-agent").unwrap();

        let report = run_ingest(&sources, &client, &pipeline, &matcher(&pipeline), 100, now()).await;

        assert_eq!(report.failed_channels, vec!["Shenzhen Miners".to_string()]);
        assert!(report.groups.is_empty());
    }
}
