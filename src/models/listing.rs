use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceKind {
    /// Dollars per terahash; multiplied by each hash-rate variant.
    UnitPerTH,
    Flat,
    Unknown,
}

impl fmt::Display for PriceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceKind::UnitPerTH => write!(f, "$/TH"),
            PriceKind::Flat => write!(f, "flat"),
            PriceKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Tokens pulled out of a single line. Lives only while that line is processed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub cleaned_text: String,
    /// Terahash values; more than one when the line lists several variants.
    pub hashrates: Vec<f64>,
    pub multi: bool,
    pub price_value: Option<f64>,
    pub price_kind: PriceKind,
    pub power_watts: Option<f64>,
    pub efficiency_j_per_th: Option<f64>,
    pub quantity: u32,
    /// `cleaned_text` with every matched numeric token cut out; input of the
    /// name canonicalizer.
    pub residual: String,
}

/// No single machine is offered above this; larger figures are misparsed
/// numbers such as phone numbers or wallet fragments.
pub const MAX_PRICE_USD: f64 = 10_000_000.0;

/// One price observation for one model/hash-rate variant from one vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
    pub hashrate_th: f64,
    pub price_usd: u64,
    pub source: String,
    pub observed_at: DateTime<Utc>,
    pub power_watts: Option<u32>,
}

impl Listing {
    /// Materializes a listing, refusing non-positive prices or hash-rates and
    /// prices above [`MAX_PRICE_USD`].
    pub fn new(
        name: impl Into<String>,
        hashrate_th: f64,
        price_usd: f64,
        source: impl Into<String>,
        observed_at: DateTime<Utc>,
        power_watts: Option<f64>,
    ) -> Option<Self> {
        if !(hashrate_th.is_finite() && hashrate_th > 0.0) {
            return None;
        }
        let price = price_usd.round();
        if !(price.is_finite() && (1.0..=MAX_PRICE_USD).contains(&price)) {
            return None;
        }

        Some(Self {
            name: name.into(),
            hashrate_th,
            price_usd: price as u64,
            source: source.into(),
            observed_at,
            power_watts: power_watts
                .filter(|w| w.is_finite() && *w > 0.0)
                .map(|w| w.round() as u32),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_negative_values() {
        let now = Utc::now();
        assert!(Listing::new("Antminer S21", 0.0, 3000.0, "V", now, None).is_none());
        assert!(Listing::new("Antminer S21", 200.0, 0.4, "V", now, None).is_none());
        assert!(Listing::new("Antminer S21", -5.0, 3000.0, "V", now, None).is_none());
        assert!(Listing::new("Antminer S21", f64::NAN, 3000.0, "V", now, None).is_none());
    }

    #[test]
    fn rejects_prices_above_the_ceiling() {
        let now = Utc::now();
        assert!(Listing::new("Antminer S21", 200.0, 1e23, "V", now, None).is_none());
        assert!(Listing::new("Antminer S21", 200.0, MAX_PRICE_USD + 1.0, "V", now, None).is_none());
        assert!(Listing::new("Antminer S21", 200.0, f64::INFINITY, "V", now, None).is_none());
        assert_eq!(
            Listing::new("Antminer S21", 200.0, MAX_PRICE_USD, "V", now, None).map(|l| l.price_usd),
            Some(10_000_000)
        );
    }

    #[test]
    fn rounds_price_and_power() {
        let listing = Listing::new("Antminer S21", 270.0, 23.6 * 270.0, "V", Utc::now(), Some(3499.6)).unwrap();
        assert_eq!(listing.price_usd, 6372);
        assert_eq!(listing.power_watts, Some(3500));
    }
}
