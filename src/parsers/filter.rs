use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::rules::CompiledRules;

// Header lines carry no model numbers, prices or hash-rates.
static THREE_DIGITS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{3}").expect("Invalid three digit regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Blank,
    NegativeKeyword,
    RejectedPhrase,
    NoHashrate,
    NoPrice,
    OffTopic,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Blank => write!(f, "blank"),
            DropReason::NegativeKeyword => write!(f, "negative keyword"),
            DropReason::RejectedPhrase => write!(f, "rejected phrase"),
            DropReason::NoHashrate => write!(f, "no hash-rate"),
            DropReason::NoPrice => write!(f, "no price"),
            DropReason::OffTopic => write!(f, "off-topic name"),
        }
    }
}

/// Whether a whole message is worth splitting into lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageVerdict {
    Accept,
    Stale,
    NoKeyword,
    BuyRequest,
}

/// State carried from line to line inside one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineContext {
    pub region: Option<String>,
}

impl LineContext {
    pub fn with_region(self, tag: impl Into<String>) -> Self {
        Self {
            region: Some(tag.into()),
        }
    }

    /// Listing source: the channel title plus the active region tag.
    pub fn source_for(&self, channel: &str) -> String {
        match &self.region {
            Some(tag) => format!("{} ({})", channel, tag),
            None => channel.to_string(),
        }
    }
}

/// Tag of the region this line announces (`Hong Kong Spot Stock`), if any.
pub fn region_header(line: &str, rules: &CompiledRules) -> Option<String> {
    if THREE_DIGITS_REGEX.is_match(line) {
        return None;
    }
    rules
        .regions
        .iter()
        .find(|region| region.header.is_match(line))
        .map(|region| region.tag.clone())
}

/// Gate applied once per message, before any line is looked at.
pub fn screen_message(
    text: &str,
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    max_age_hours: i64,
    rules: &CompiledRules,
) -> MessageVerdict {
    if !is_fresh(timestamp, now, max_age_hours) {
        return MessageVerdict::Stale;
    }

    let lower = text.to_lowercase();
    // Demand, not supply, whatever models it names.
    if rules.buy_keywords.iter().any(|k| lower.contains(k.as_str())) {
        return MessageVerdict::BuyRequest;
    }
    if !rules.positive_keywords.iter().any(|k| lower.contains(k.as_str())) {
        return MessageVerdict::NoKeyword;
    }

    MessageVerdict::Accept
}

pub fn is_fresh(timestamp: DateTime<Utc>, now: DateTime<Utc>, max_age_hours: i64) -> bool {
    now.signed_duration_since(timestamp) <= Duration::hours(max_age_hours)
}

/// Line-level rejection ahead of token parsing.
pub fn reject_line(line: &str, rules: &CompiledRules) -> Option<DropReason> {
    if line.trim().is_empty() {
        Some(DropReason::Blank)
    } else if rules.has_negative_keyword(line) {
        Some(DropReason::NegativeKeyword)
    } else {
        None
    }
}

/// Phrase rejection after token parsing. Runs on the residual so a price
/// such as `$2510` is never read as a `2510` delivery code.
pub fn reject_residual(residual: &str, rules: &CompiledRules) -> Option<DropReason> {
    rules
        .is_rejected_phrase(residual)
        .then_some(DropReason::RejectedPhrase)
}
