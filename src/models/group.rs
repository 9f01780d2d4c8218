use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// NewType pattern for type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey(pub String);

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a group's power figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSource {
    /// Read from a listing line (watts or J/T).
    Parsed,
    /// Backfilled from the reference catalog.
    Catalog,
    /// Nothing known; the consumer estimates it.
    Estimated,
}

/// One distinct (source, price) offer inside a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorEntry {
    pub source: String,
    pub price_usd: u64,
    /// Freshest sighting of this offer.
    pub observed_at: DateTime<Utc>,
    pub outlier: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub min: u64,
    pub max: u64,
    pub middle: f64,
    /// Distinct (source, price) pairs, not raw sightings.
    pub count: usize,
}

impl GroupStats {
    pub fn from_prices(prices: &[u64]) -> Option<Self> {
        if prices.is_empty() {
            return None;
        }

        let mut sorted = prices.to_vec();
        sorted.sort_unstable();

        let n = sorted.len();
        let middle = if n % 2 == 0 {
            (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
        } else {
            sorted[n / 2] as f64
        };

        Some(Self {
            min: sorted[0],
            max: sorted[n - 1],
            middle,
            count: n,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedGroup {
    pub key: GroupKey,
    /// Longest name seen for this key.
    pub display_name: String,
    pub hashrate_th: u64,
    /// Sorted by price, then source.
    pub listings: Vec<VendorEntry>,
    pub stats: GroupStats,
    pub power_watts: Option<u32>,
    pub power_source: PowerSource,
}

impl AggregatedGroup {
    /// Public price of the group: the median, which a single lowball offer
    /// cannot drag down.
    pub fn price(&self) -> u64 {
        self.stats.middle.round() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogListing {
    pub source: String,
    pub price: u64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub outlier: bool,
}

/// Serialized form of an [`AggregatedGroup`] handed to storage and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub name: String,
    #[serde(rename = "hashrateTH")]
    pub hashrate_th: u64,
    pub price: u64,
    pub stats: GroupStats,
    pub listings: Vec<CatalogListing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_watts: Option<u32>,
    pub power_source: PowerSource,
}

impl From<&AggregatedGroup> for CatalogEntry {
    fn from(group: &AggregatedGroup) -> Self {
        Self {
            name: group.display_name.clone(),
            hashrate_th: group.hashrate_th,
            price: group.price(),
            stats: group.stats.clone(),
            listings: group
                .listings
                .iter()
                .map(|entry| CatalogListing {
                    source: entry.source.clone(),
                    price: entry.price_usd,
                    date: entry.observed_at,
                    outlier: entry.outlier,
                })
                .collect(),
            power_watts: group.power_watts,
            power_source: group.power_source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn median_of_even_count_averages_the_middle_pair() {
        let stats = GroupStats::from_prices(&[400, 100, 300, 200]).unwrap();
        assert_eq!(stats.middle, 250.0);
        assert_eq!(stats.min, 100);
        assert_eq!(stats.max, 400);
        assert_eq!(stats.count, 4);
    }

    #[test]
    fn median_of_odd_count_is_the_middle_value() {
        let stats = GroupStats::from_prices(&[300, 100, 200]).unwrap();
        assert_eq!(stats.middle, 200.0);
    }

    #[test]
    fn middle_pair_near_the_integer_limit_does_not_overflow() {
        let stats = GroupStats::from_prices(&[u64::MAX, u64::MAX - 1]).unwrap();
        assert_eq!(stats.min, u64::MAX - 1);
        assert_eq!(stats.max, u64::MAX);
        assert!(stats.middle.is_finite());
        assert!(stats.middle > 1.8e19);
    }

    #[test]
    fn empty_prices_have_no_stats() {
        assert!(GroupStats::from_prices(&[]).is_none());
    }

    #[test]
    fn catalog_entry_uses_wire_field_names() {
        let observed_at = DateTime::parse_from_rfc3339("2026-10-17T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let group = AggregatedGroup {
            key: GroupKey("s21_200".to_string()),
            display_name: "Antminer S21".to_string(),
            hashrate_th: 200,
            listings: vec![VendorEntry {
                source: "VendorX".to_string(),
                price_usd: 3000,
                observed_at,
                outlier: false,
            }],
            stats: GroupStats::from_prices(&[3000]).unwrap(),
            power_watts: None,
            power_source: PowerSource::Estimated,
        };

        let value = serde_json::to_value(CatalogEntry::from(&group)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "name": "Antminer S21",
                "hashrateTH": 200,
                "price": 3000,
                "stats": { "min": 3000, "max": 3000, "middle": 3000.0, "count": 1 },
                "listings": [
                    { "source": "VendorX", "price": 3000, "date": "2026-10-17T08:00:00Z", "outlier": false }
                ],
                "powerSource": "estimated"
            })
        );
    }
}
