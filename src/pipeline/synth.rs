use chrono::{DateTime, Utc};

use crate::models::{Listing, ParsedLine, PriceKind};

/// Turn a parsed line and its canonical name into listings, one per
/// hash-rate variant. Unit prices and J/T efficiencies are recomputed for
/// each variant; flat figures are shared.
pub fn synthesize(
    parsed: &ParsedLine,
    name: &str,
    source: &str,
    observed_at: DateTime<Utc>,
) -> Vec<Listing> {
    let Some(price_value) = parsed.price_value else {
        return Vec::new();
    };

    parsed
        .hashrates
        .iter()
        .filter_map(|&hashrate_th| {
            let price = match parsed.price_kind {
                PriceKind::UnitPerTH => price_value * hashrate_th,
                PriceKind::Flat => price_value,
                PriceKind::Unknown => return None,
            };
            let power = parsed
                .efficiency_j_per_th
                .map(|efficiency| efficiency * hashrate_th)
                .or(parsed.power_watts);

            Listing::new(name, hashrate_th, price, source, observed_at, power)
        })
        .collect()
}
