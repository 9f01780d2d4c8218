//! Free-text model name -> canonical display name.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::CompiledRules;

static MENTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\w+").expect("Invalid mention regex"));

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:https?://|www\.|t\.me/)\S+").expect("Invalid url regex")
});

static TRAILING_DIGITS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\s+\d+)+$").expect("Invalid trailing digits regex"));

const SEPARATORS: &[char] = &[
    ':', '—', '–', '-', ',', '/', '|', '(', ')', '[', ']', '*', '!', '~', '#', '$', '=', ';', '"',
    '•',
];

/// Emoji, pictographs, arrows, dingbats and the joiners that glue them.
fn is_symbol(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF
            | 0x2190..=0x21FF
            | 0x2300..=0x23FF
            | 0x25A0..=0x27BF
            | 0x2B00..=0x2BFF
            | 0xFE00..=0xFE0F
            | 0x200D
    )
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove mentions, links, separators, stop words and symbols.
pub fn strip_noise(text: &str, rules: &CompiledRules) -> String {
    let text = MENTION_REGEX.replace_all(text, " ");
    let text = URL_REGEX.replace_all(&text, " ");

    let text: String = text
        .chars()
        .map(|c| if is_symbol(c) || SEPARATORS.contains(&c) { ' ' } else { c })
        .collect();

    let text = match &rules.stop_words {
        Some(stop_words) => stop_words.replace_all(&text, " ").into_owned(),
        None => text,
    };

    collapse_whitespace(&text)
}

/// Prepend a brand when the text starts with a known model-number shape and
/// names no brand itself.
pub fn infer_brand(text: &str, rules: &CompiledRules) -> String {
    let has_brand = rules
        .brand_present
        .as_ref()
        .map_or(false, |re| re.is_match(text));
    if has_brand {
        return text.to_string();
    }

    rules
        .brand_rules
        .iter()
        .find(|rule| rule.pattern.is_match(text))
        .map(|rule| format!("{} {}", rule.brand, text))
        .unwrap_or_else(|| text.to_string())
}

/// Apply the alias table in order. Each rule sees the output of the previous one.
pub fn apply_aliases(text: &str, rules: &CompiledRules) -> String {
    rules
        .aliases
        .iter()
        .fold(text.to_string(), |acc, alias| alias.apply(&acc))
}

/// Collapse whitespace, drop dangling trailing numbers and doubled tokens.
pub fn finalize(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    let trimmed = TRAILING_DIGITS_REGEX.replace(&collapsed, "");

    let mut tokens: Vec<&str> = Vec::new();
    for token in trimmed.split_whitespace() {
        let doubled = tokens.last().map_or(false, |last| {
            last.trim_matches('.').eq_ignore_ascii_case(token.trim_matches('.'))
        });
        if !doubled {
            tokens.push(token);
        }
    }

    tokens
        .join(" ")
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '.' | '\'' | '&'))
        .to_string()
}

/// Full canonicalization of a line's residual text.
pub fn canonicalize(residual: &str, rules: &CompiledRules) -> String {
    let stripped = strip_noise(residual, rules);
    if stripped.is_empty() {
        return stripped;
    }
    let branded = infer_brand(&stripped, rules);
    finalize(&apply_aliases(&branded, rules))
}

/// Strict topic filter: the name must belong to a known product family and
/// must not carry a delivery-date fragment.
pub fn is_on_topic(name: &str, rules: &CompiledRules) -> bool {
    !name.is_empty()
        && rules.product_patterns.iter().any(|re| re.is_match(name))
        && !rules.is_rejected_phrase(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleTables;
    use pretty_assertions::assert_eq;

    fn rules() -> CompiledRules {
        CompiledRules::compile(&RuleTables::default()).unwrap()
    }

    #[test]
    fn infers_each_brand_family() {
        let rules = rules();
        assert_eq!(canonicalize("S19 XP", &rules), "Antminer S19 XP");
        assert_eq!(canonicalize("m60s", &rules), "Whatsminer M60S");
        assert_eq!(canonicalize("A1466", &rules), "Avalon A1466");
        assert_eq!(canonicalize("Bitmain S21", &rules), "Antminer S21");
    }

    #[test]
    fn hydro_fragments_are_expanded() {
        let rules = rules();
        assert_eq!(canonicalize("S21+   hydro: ", &rules), "Antminer S21+ Hydro");
        assert_eq!(canonicalize("S21XPhyd", &rules), "Antminer S21 XP Hydro");
        assert_eq!(canonicalize("s21 xph", &rules), "Antminer S21 XP Hydro");
        assert_eq!(canonicalize("S21 hydxp", &rules), "Antminer S21 XP Hydro");
    }

    #[test]
    fn dual_model_artifacts_are_split() {
        let rules = rules();
        assert_eq!(canonicalize("S21T21", &rules), "Antminer S21 T21");
    }

    #[test]
    fn plus_variants_are_reattached() {
        let rules = rules();
        assert_eq!(canonicalize("S21 Plus", &rules), "Antminer S21+");
        assert_eq!(canonicalize("M30S ++", &rules), "Whatsminer M30S++");
    }

    #[test]
    fn variant_letter_casing_only_after_model_number() {
        let rules = rules();
        assert_eq!(canonicalize("s19j pro", &rules), "Antminer S19J Pro");
        assert_eq!(canonicalize("Whatsminer M50s a", &rules), "Whatsminer M50S a");
    }

    #[test]
    fn noise_is_removed() {
        let rules = rules();
        assert_eq!(
            canonicalize("🔥 @broker NEW S21 XP — spot stock, MOQ warranty https://t.me/x", &rules),
            "Antminer S21 XP"
        );
    }

    #[test]
    fn final_pass_dedupes_and_trims() {
        assert_eq!(finalize("Antminer  S21 XP XP 3"), "Antminer S21 XP");
        assert_eq!(finalize("Antminer S21 Hydro Hydro."), "Antminer S21 Hydro");
    }

    #[test]
    fn topic_filter_rejects_unknown_families() {
        let rules = rules();
        assert!(is_on_topic("Antminer S21+ Hydro", &rules));
        assert!(is_on_topic("Whatsminer M60S", &rules));
        assert!(is_on_topic("Avalon A1466", &rules));
        assert!(!is_on_topic("Antminer S9", &rules));
        assert!(!is_on_topic("RTX 4090", &rules));
        assert!(!is_on_topic("", &rules));
        assert!(!is_on_topic("Antminer S21 2506", &rules));
    }
}
