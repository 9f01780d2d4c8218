pub mod aggregate;
pub mod matcher;
pub mod synth;

pub use aggregate::*;
pub use matcher::*;
pub use synth::*;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::{PipelineSettings, RuleTables};
use crate::error::RuleError;
use crate::models::{AggregatedGroup, Listing, RawMessage};
use crate::parsers::{
    canonicalize, clean_text, is_on_topic, parse_line, region_header, reject_line,
    reject_residual, screen_message, strip_line_marker, DropReason, LineContext,
    MessageVerdict,
};
use crate::rules::CompiledRules;

/// What became of one line of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// The line announced a stock location; later lines carry its tag.
    RegionHeader(String),
    Dropped(DropReason),
    Listings(Vec<Listing>),
}

/// Result of pushing one batch of messages through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub groups: Vec<AggregatedGroup>,
    pub listing_count: usize,
    pub messages_used: usize,
}

/// Compiled rule tables plus numeric settings. Built once per process and
/// shared read-only by every run.
pub struct Pipeline {
    rules: CompiledRules,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(tables: &RuleTables, settings: PipelineSettings) -> Result<Self, RuleError> {
        Ok(Self {
            rules: CompiledRules::compile(tables)?,
            settings,
        })
    }

    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn screen_message(&self, message: &RawMessage, now: DateTime<Utc>) -> MessageVerdict {
        screen_message(
            &message.text,
            message.timestamp,
            now,
            self.settings.max_message_age_hours,
            &self.rules,
        )
    }

    /// Classify, parse and name one raw line under the region context left by
    /// the lines before it.
    pub fn process_line(
        &self,
        raw: &str,
        context: &LineContext,
        channel: &str,
        observed_at: DateTime<Utc>,
    ) -> LineOutcome {
        let cleaned = clean_text(raw);
        let line = strip_line_marker(&cleaned);

        if let Some(tag) = region_header(line, &self.rules) {
            return LineOutcome::RegionHeader(tag);
        }
        if let Some(reason) = reject_line(line, &self.rules) {
            return LineOutcome::Dropped(reason);
        }

        let parsed = parse_line(line, &self.settings);
        if let Some(reason) = reject_residual(&parsed.residual, &self.rules) {
            return LineOutcome::Dropped(reason);
        }
        if let Some(reason) = parsed.rejection() {
            return LineOutcome::Dropped(reason);
        }

        let name = canonicalize(&parsed.residual, &self.rules);
        if !is_on_topic(&name, &self.rules) {
            return LineOutcome::Dropped(DropReason::OffTopic);
        }

        let listings = synthesize(&parsed, &name, &context.source_for(channel), observed_at);
        if listings.is_empty() {
            return LineOutcome::Dropped(DropReason::NoPrice);
        }
        LineOutcome::Listings(listings)
    }

    /// All listings of one message. The region context starts empty and is
    /// threaded through the lines in order.
    pub fn process_message(&self, message: &RawMessage, now: DateTime<Utc>) -> Vec<Listing> {
        let verdict = self.screen_message(message, now);
        if verdict != MessageVerdict::Accept {
            debug!("Skipping message from {}: {:?}", message.source_channel, verdict);
            return Vec::new();
        }

        let (_, listings) = message.text.lines().fold(
            (LineContext::default(), Vec::new()),
            |(context, mut listings), raw| {
                match self.process_line(raw, &context, &message.source_channel, message.timestamp) {
                    LineOutcome::RegionHeader(tag) => return (context.with_region(tag), listings),
                    LineOutcome::Dropped(DropReason::Blank) => {}
                    LineOutcome::Dropped(reason) => {
                        debug!("Dropped line ({}): {}", reason, raw.trim());
                    }
                    LineOutcome::Listings(found) => listings.extend(found),
                }
                (context, listings)
            },
        );
        listings
    }

    /// Runs a whole batch and aggregates it. Groups are not yet enriched
    /// from the reference catalog.
    pub fn run<'a>(
        &self,
        messages: impl IntoIterator<Item = &'a RawMessage>,
        now: DateTime<Utc>,
    ) -> PipelineRun {
        let mut aggregator = Aggregator::new(&self.rules, self.settings.outlier_ratio);
        let mut listing_count = 0;
        let mut messages_used = 0;

        for message in messages {
            let listings = self.process_message(message, now);
            if !listings.is_empty() {
                messages_used += 1;
                listing_count += listings.len();
                aggregator.extend(&listings);
            }
        }

        let groups = aggregator.finish();
        info!(
            "Pipeline produced {} groups from {} listings in {} messages",
            groups.len(),
            listing_count,
            messages_used
        );

        PipelineRun {
            groups,
            listing_count,
            messages_used,
        }
    }
}
