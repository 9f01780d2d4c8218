use once_cell::sync::Lazy;
use regex::Regex;

use super::{digit_follows, letter_follows, slash_follows, TokenMatch};
use crate::config::LotPriceHeuristic;

// `$15.3/T`, `15.3u/t`, `15.3 usdt/th`, `15.3$/T`
static UNIT_PRICE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\$\s*(\d+(?:\.\d+)?)|(?:^|[^\d.])(\d+(?:\.\d+)?)\s*(?:usdt|usd|u|\$))\s*/\s*th?",
    )
    .expect("Invalid unit price regex")
});

// `$2,150`, `$3000`, `2900u`, `5000 usdt`, `2150$`
static FLAT_PRICE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\$\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)|(?:^|[^\d.$])(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(?:usdt|usd|u|\$))",
    )
    .expect("Invalid flat price regex")
});

static QUANTITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.])(\d+)\s*(?:pcs|pieces|units|x\s)")
        .expect("Invalid quantity regex")
});

/// Parse a USD amount, tolerating `$`, `USD` and thousands separators.
pub fn parse_usd_price(price_text: &str) -> Option<f64> {
    let cleaned = price_text
        .replace('$', "")
        .replace("USD", "")
        .replace(',', "")
        .trim()
        .to_string();

    cleaned.parse::<f64>().ok()
}

/// Find a per-terahash price (currency marker plus `/T` suffix).
pub fn find_unit_price(text: &str) -> Option<TokenMatch<f64>> {
    UNIT_PRICE_REGEX.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        if letter_follows(text, whole.end()) {
            return None;
        }

        let (number, start) = match (caps.get(1), caps.get(2)) {
            (Some(n), _) => (n, whole.start()),
            (None, Some(n)) => (n, n.start()),
            (None, None) => return None,
        };
        let value = parse_usd_price(number.as_str())?;
        (value > 0.0).then(|| TokenMatch {
            value,
            span: start..whole.end(),
        })
    })
}

/// Find a flat price: `$<number>` or `<number>` followed by `u`/`usd`/`usdt`,
/// never followed by `/` (that would be a unit price).
pub fn find_flat_price(text: &str) -> Option<TokenMatch<f64>> {
    let mut from = 0;
    while let Some(caps) = FLAT_PRICE_REGEX.captures_at(text, from) {
        let whole = caps.get(0)?;
        from = whole.end();
        if slash_follows(text, whole.end()) {
            continue;
        }

        let (number, start) = match (caps.get(1), caps.get(2)) {
            (Some(n), _) => (n, whole.start()),
            (None, Some(n)) => {
                // `100 units`: the `u` starts a word, not a currency
                if letter_follows(text, whole.end()) {
                    continue;
                }
                // `2507 $2900`: the dollar sign opens the next amount
                if whole.as_str().ends_with('$') && digit_follows(text, whole.end()) {
                    from = whole.end() - 1;
                    continue;
                }
                (n, n.start())
            }
            (None, None) => continue,
        };
        if let Some(value) = parse_usd_price(number.as_str()).filter(|v| *v > 0.0) {
            return Some(TokenMatch {
                value,
                span: start..whole.end(),
            });
        }
    }
    None
}

/// Find a lot size such as `100pcs`, `20 units` or `5x `.
pub fn find_quantity(text: &str) -> Option<TokenMatch<u32>> {
    QUANTITY_REGEX.captures_iter(text).find_map(|caps| {
        let number = caps.get(1)?;
        let whole = caps.get(0)?;
        let value = number.as_str().parse::<u32>().ok()?;
        (value >= 1).then(|| TokenMatch {
            value,
            span: number.start()..whole.end(),
        })
    })
}

/// Rewrite a lot total into the implied unit price when the per-unit figure
/// is plausible; otherwise the flat price stands.
pub fn correct_lot_price(price: f64, quantity: u32, heuristic: &LotPriceHeuristic) -> f64 {
    if quantity <= 1 || price <= heuristic.min_total {
        return price;
    }

    let per_unit = price / f64::from(quantity);
    if (heuristic.unit_floor..=heuristic.unit_ceiling).contains(&per_unit) {
        per_unit
    } else {
        price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unit_price_in_either_order() {
        assert_eq!(find_unit_price("S21+ 319/358/395T hydro: 15.3u/t").unwrap().value, 15.3);
        assert_eq!(find_unit_price("S21 XP 270T $23.6/T").unwrap().value, 23.6);
        assert_eq!(find_unit_price("T21 190T 11.5 USDT/TH").unwrap().value, 11.5);
        assert_eq!(find_unit_price("S21 200T 14$/T").unwrap().value, 14.0);
        assert!(find_unit_price("S21 200T $3000").is_none());
    }

    #[test]
    fn unit_price_span_covers_marker_and_suffix() {
        let text = "S21 270T 23.6u/t";
        let found = find_unit_price(text).unwrap();
        assert_eq!(&text[found.span], "23.6u/t");
    }

    #[test]
    fn flat_price_forms() {
        assert_eq!(find_flat_price("S19 XP 141T 3010W $2,150").unwrap().value, 2150.0);
        assert_eq!(find_flat_price("M60S 186T 2900u").unwrap().value, 2900.0);
        assert_eq!(find_flat_price("S21 200T 5000 USDT").unwrap().value, 5000.0);
        assert_eq!(find_flat_price("S21 200T 3100$").unwrap().value, 3100.0);
    }

    #[test]
    fn bare_number_before_a_dollar_amount_is_not_the_price() {
        let text = "S21 200T 2507 $2900";
        let found = find_flat_price(text).unwrap();
        assert_eq!(found.value, 2900.0);
        assert_eq!(&text[found.span], "$2900");
        assert_eq!(find_flat_price("S21 200T 3100$ net").unwrap().value, 3100.0);
    }

    #[test]
    fn flat_price_rejects_unit_prices_and_words() {
        assert!(find_flat_price("S21 270T 23.6u/t").is_none());
        assert!(find_flat_price("S21 270T $23.6 /T").is_none());
        assert!(find_flat_price("S21 200T 100 units").is_none());
    }

    #[test]
    fn quantity_forms() {
        assert_eq!(find_quantity("100pcs S19 XP").unwrap().value, 100);
        assert_eq!(find_quantity("S21 20 units left").unwrap().value, 20);
        assert_eq!(find_quantity("5x S21 200T").unwrap().value, 5);
        assert!(find_quantity("S21 200T $3000").is_none());
    }

    #[test]
    fn lot_total_becomes_unit_price_inside_band() {
        let heuristic = LotPriceHeuristic::default();
        assert_eq!(correct_lot_price(8000.0, 100, &heuristic), 80.0);
        assert_eq!(correct_lot_price(60000.0, 20, &heuristic), 3000.0);
    }

    #[test]
    fn lot_correction_leaves_implausible_results_alone() {
        let heuristic = LotPriceHeuristic::default();
        // below the lot threshold
        assert_eq!(correct_lot_price(4000.0, 2, &heuristic), 4000.0);
        // implied unit price under the floor
        assert_eq!(correct_lot_price(6000.0, 1000, &heuristic), 6000.0);
        // single unit
        assert_eq!(correct_lot_price(9000.0, 1, &heuristic), 9000.0);
    }
}
