use once_cell::sync::Lazy;
use regex::Regex;

use super::{letter_follows, TokenMatch};

// A slash/hyphen separated run of numbers, each optionally suffixed with T/TH.
static HASHRATE_RUN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.])(\d+(?:\s*th?)?(?:\s*[/\-]\s*\d+(?:\s*th?)?)+)")
        .expect("Invalid hashrate run regex")
});

static HASHRATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.])(\d+(?:\.\d+)?)\s*(th|t|gh|g|mh|m)(?:/s)?")
        .expect("Invalid hashrate regex")
});

static POWER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.])(\d+(?:\.\d+)?)\s*w(?:atts?)?")
        .expect("Invalid power regex")
});

static EFFICIENCY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.])(\d+(?:\.\d+)?)\s*j\s*/\s*th?")
        .expect("Invalid efficiency regex")
});

/// Convert a value in the given hash-rate unit to terahash.
pub fn to_terahash(value: f64, unit: &str) -> f64 {
    match unit.to_ascii_lowercase().chars().next() {
        Some('g') => value / 1_000.0,
        Some('m') => value / 1_000_000.0,
        _ => value,
    }
}

/// Find a run such as `434/436/440` or `440T/442T` listing several variants.
/// Only three-digit members above `min_value` count; at least two must remain.
pub fn find_hashrate_run(text: &str, min_value: f64) -> Option<TokenMatch<Vec<f64>>> {
    for caps in HASHRATE_RUN_REGEX.captures_iter(text) {
        let Some(run) = caps.get(1) else { continue };
        if letter_follows(text, run.end()) && run.as_str().to_ascii_lowercase().ends_with('t') {
            // `200/230 tons`: the trailing `t` belongs to a word
            continue;
        }

        let values: Vec<f64> = run
            .as_str()
            .split(|c| c == '/' || c == '-')
            .map(|piece| {
                piece
                    .trim()
                    .trim_end_matches(|c: char| c.is_ascii_alphabetic())
                    .trim()
            })
            .filter(|digits| digits.len() == 3 && digits.chars().all(|c| c.is_ascii_digit()))
            .filter_map(|digits| digits.parse::<f64>().ok())
            .filter(|value| *value > min_value)
            .collect();

        if (2..=4).contains(&values.len()) {
            return Some(TokenMatch {
                value: values,
                span: run.range(),
            });
        }
    }

    None
}

/// Find the first `<number><unit>` hash-rate, in TH. The unit may not run
/// into a word (`200 then`, `5 min`).
pub fn find_hashrate(text: &str) -> Option<TokenMatch<f64>> {
    HASHRATE_REGEX.captures_iter(text).find_map(|caps| {
        let number = caps.get(1)?;
        let unit = caps.get(2)?;
        let whole = caps.get(0)?;
        if letter_follows(text, whole.end()) {
            return None;
        }

        let value = to_terahash(number.as_str().parse::<f64>().ok()?, unit.as_str());
        (value > 0.0).then(|| TokenMatch {
            value,
            span: number.start()..whole.end(),
        })
    })
}

/// Find a plain `<number>W` power figure.
pub fn find_power(text: &str) -> Option<TokenMatch<f64>> {
    first_number_with_suffix(&POWER_REGEX, text)
}

/// Find a `<number>J/T` efficiency figure.
pub fn find_efficiency(text: &str) -> Option<TokenMatch<f64>> {
    first_number_with_suffix(&EFFICIENCY_REGEX, text)
}

fn first_number_with_suffix(regex: &Regex, text: &str) -> Option<TokenMatch<f64>> {
    regex.captures_iter(text).find_map(|caps| {
        let number = caps.get(1)?;
        let whole = caps.get(0)?;
        if letter_follows(text, whole.end()) {
            return None;
        }

        let value = number.as_str().parse::<f64>().ok()?;
        (value > 0.0).then(|| TokenMatch {
            value,
            span: number.start()..whole.end(),
        })
    })
}
