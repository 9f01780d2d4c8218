use crate::config::PipelineSettings;
use crate::models::{ParsedLine, PriceKind};

use super::{
    correct_lot_price, excise, find_efficiency, find_flat_price, find_hashrate,
    find_hashrate_run, find_power, find_quantity, find_unit_price, DropReason,
};

/// Pull hash-rate, price, power and quantity tokens out of one cleaned line.
///
/// A slash/hyphen run of variants wins over a single hash-rate. A unit price
/// wins over a flat price; a flat price may be rewritten from a lot total to
/// a unit price. The line's remaining text is kept for the canonicalizer.
pub fn parse_line(text: &str, settings: &PipelineSettings) -> ParsedLine {
    let mut spans = Vec::new();

    let (hashrates, multi) = match find_hashrate_run(text, settings.min_multi_hashrate) {
        Some(run) => {
            spans.push(run.span);
            (run.value, true)
        }
        None => match find_hashrate(text) {
            Some(single) => {
                spans.push(single.span);
                (vec![single.value], false)
            }
            None => (Vec::new(), false),
        },
    };

    let power = find_power(text);
    let efficiency = find_efficiency(text);
    let unit_price = find_unit_price(text);
    let flat_price = find_flat_price(text);
    let quantity = find_quantity(text);

    for span in [&power, &efficiency, &unit_price, &flat_price]
        .into_iter()
        .flatten()
        .map(|m| m.span.clone())
        .chain(quantity.iter().map(|m| m.span.clone()))
    {
        spans.push(span);
    }

    let lot_size = quantity.as_ref().map_or(1, |q| q.value.max(1));

    let (price_value, price_kind) = match (&unit_price, &flat_price) {
        (Some(unit), _) => (Some(unit.value), PriceKind::UnitPerTH),
        (None, Some(flat)) => (
            Some(correct_lot_price(flat.value, lot_size, &settings.lot_price)),
            PriceKind::Flat,
        ),
        (None, None) => (None, PriceKind::Unknown),
    };

    ParsedLine {
        cleaned_text: text.to_string(),
        hashrates,
        multi,
        price_value,
        price_kind,
        power_watts: power.map(|p| p.value),
        efficiency_j_per_th: efficiency.map(|e| e.value),
        quantity: lot_size,
        residual: excise(text, &spans),
    }
}

impl ParsedLine {
    /// Why this line cannot yield a listing, if it cannot.
    pub fn rejection(&self) -> Option<DropReason> {
        if self.hashrates.is_empty() {
            return Some(DropReason::NoHashrate);
        }
        match self.price_value {
            Some(price) if price > 0.0 && self.price_kind != PriceKind::Unknown => None,
            _ => Some(DropReason::NoPrice),
        }
    }
}
