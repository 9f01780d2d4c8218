use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;

use crate::models::{AggregatedGroup, GroupKey, GroupStats, Listing, PowerSource, VendorEntry};
use crate::rules::CompiledRules;

/// Lower-cased name without brand/cosmetic words or punctuation. `+` is
/// spelled out so `S21+` and `S21` stay apart.
pub fn name_core(name: &str, noise: Option<&Regex>) -> String {
    let lower = name.to_lowercase();
    let stripped = match noise {
        Some(re) => re.replace_all(&lower, " ").into_owned(),
        None => lower,
    };

    stripped
        .replace('+', "plus")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

pub fn group_key(name: &str, hashrate_th: f64, noise: Option<&Regex>) -> GroupKey {
    GroupKey(format!("{}_{}", name_core(name, noise), hashrate_th.round() as u64))
}

#[derive(Debug, Clone)]
struct GroupBuilder {
    display_name: String,
    hashrate_th: u64,
    /// (source, price) -> freshest sighting
    offers: BTreeMap<(String, u64), DateTime<Utc>>,
    power: Option<(DateTime<Utc>, u32)>,
}

impl GroupBuilder {
    fn new(listing: &Listing) -> Self {
        Self {
            display_name: listing.name.clone(),
            hashrate_th: listing.hashrate_th.round() as u64,
            offers: BTreeMap::new(),
            power: None,
        }
    }

    fn add(&mut self, listing: &Listing) {
        if listing.name.chars().count() > self.display_name.chars().count() {
            self.display_name = listing.name.clone();
        }

        self.offers
            .entry((listing.source.clone(), listing.price_usd))
            .and_modify(|seen| {
                if listing.observed_at > *seen {
                    *seen = listing.observed_at;
                }
            })
            .or_insert(listing.observed_at);

        if let Some(watts) = listing.power_watts {
            let newer = self
                .power
                .map_or(true, |(observed_at, _)| listing.observed_at > observed_at);
            if newer {
                self.power = Some((listing.observed_at, watts));
            }
        }
    }

    fn build(self, key: GroupKey, outlier_ratio: f64) -> Option<AggregatedGroup> {
        let prices: Vec<u64> = self.offers.keys().map(|(_, price)| *price).collect();
        let stats = GroupStats::from_prices(&prices)?;

        let flag_outliers = stats.count >= 3 && outlier_ratio > 1.0;
        let mut listings: Vec<VendorEntry> = self
            .offers
            .into_iter()
            .map(|((source, price_usd), observed_at)| {
                let price = price_usd as f64;
                let outlier = flag_outliers
                    && (price < stats.middle / outlier_ratio || price > stats.middle * outlier_ratio);
                VendorEntry {
                    source,
                    price_usd,
                    observed_at,
                    outlier,
                }
            })
            .collect();
        listings.sort_by(|a, b| a.price_usd.cmp(&b.price_usd).then_with(|| a.source.cmp(&b.source)));

        let (power_watts, power_source) = match self.power {
            Some((_, watts)) => (Some(watts), PowerSource::Parsed),
            None => (None, PowerSource::Estimated),
        };

        Some(AggregatedGroup {
            key,
            display_name: self.display_name,
            hashrate_th: self.hashrate_th,
            listings,
            stats,
            power_watts,
            power_source,
        })
    }
}

/// Buckets listings by model and rounded hash-rate, collapsing repeat
/// sightings of the same (source, price) offer.
pub struct Aggregator {
    noise: Option<Regex>,
    outlier_ratio: f64,
    groups: BTreeMap<GroupKey, GroupBuilder>,
}

impl Aggregator {
    pub fn new(rules: &CompiledRules, outlier_ratio: f64) -> Self {
        Self {
            noise: rules.key_noise.clone(),
            outlier_ratio,
            groups: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, listing: &Listing) {
        let key = group_key(&listing.name, listing.hashrate_th, self.noise.as_ref());
        self.groups
            .entry(key)
            .or_insert_with(|| GroupBuilder::new(listing))
            .add(listing);
    }

    pub fn extend<'a>(&mut self, listings: impl IntoIterator<Item = &'a Listing>) {
        for listing in listings {
            self.add(listing);
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups ordered by display name, then hash-rate.
    pub fn finish(self) -> Vec<AggregatedGroup> {
        let outlier_ratio = self.outlier_ratio;
        let mut groups: Vec<AggregatedGroup> = self
            .groups
            .into_iter()
            .filter_map(|(key, builder)| builder.build(key, outlier_ratio))
            .collect();

        groups.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
                .then_with(|| a.hashrate_th.cmp(&b.hashrate_th))
                .then_with(|| a.key.cmp(&b.key))
        });
        groups
    }
}
