//! Compiled form of the configurable rule tables.

use regex::{Regex, RegexBuilder};

use crate::config::RuleTables;
use crate::error::RuleError;

pub struct CompiledRegion {
    pub header: Regex,
    pub tag: String,
}

pub struct CompiledBrandRule {
    pub pattern: Regex,
    pub brand: String,
}

pub struct CompiledAlias {
    pub pattern: Regex,
    pub replacement: String,
    pub uppercase: bool,
}

impl CompiledAlias {
    pub fn apply(&self, text: &str) -> String {
        if self.uppercase {
            self.pattern
                .replace_all(text, |caps: &regex::Captures<'_>| {
                    let mut expanded = String::new();
                    caps.expand(&self.replacement, &mut expanded);
                    expanded.to_uppercase()
                })
                .into_owned()
        } else {
            self.pattern
                .replace_all(text, self.replacement.as_str())
                .into_owned()
        }
    }
}

pub struct CompiledRules {
    pub positive_keywords: Vec<String>,
    pub buy_keywords: Vec<String>,
    /// `None` when the table is empty.
    pub negative: Option<Regex>,
    pub reject_phrases: Vec<Regex>,
    pub regions: Vec<CompiledRegion>,
    pub stop_words: Option<Regex>,
    pub brand_present: Option<Regex>,
    pub brand_rules: Vec<CompiledBrandRule>,
    pub aliases: Vec<CompiledAlias>,
    pub product_patterns: Vec<Regex>,
    /// Brand words and cosmetic tokens removed from grouping keys.
    pub key_noise: Option<Regex>,
}

fn compile(table: &'static str, pattern: &str) -> Result<Regex, RuleError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| RuleError::InvalidPattern {
            table,
            pattern: pattern.to_string(),
            source,
        })
}

/// Joins literal words into one `\b(?:a|b|c)\b` alternation.
fn word_alternation(table: &'static str, words: &[String]) -> Result<Option<Regex>, RuleError> {
    let escaped: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();

    if escaped.is_empty() {
        return Ok(None);
    }

    compile(table, &format!(r"\b(?:{})\b", escaped.join("|"))).map(Some)
}

fn lowercase_all(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

impl CompiledRules {
    pub fn compile(tables: &RuleTables) -> Result<Self, RuleError> {
        let reject_phrases = tables
            .reject_phrases
            .iter()
            .map(|p| compile("reject_phrases", p))
            .collect::<Result<Vec<_>, _>>()?;

        let regions = tables
            .regions
            .iter()
            .map(|r| {
                // Only decoration (flags, bullets) may precede the region name.
                let header = format!(r"^[^\p{{L}}\p{{N}}]*(?:{})[^\n]{{0,24}}?\bstock\b", r.pattern);
                Ok(CompiledRegion {
                    header: compile("regions", &header)?,
                    tag: r.tag.clone(),
                })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;

        let brand_rules = tables
            .brand_rules
            .iter()
            .map(|r| {
                Ok(CompiledBrandRule {
                    pattern: compile("brand_rules", &r.pattern)?,
                    brand: r.brand.clone(),
                })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;

        let aliases = tables
            .aliases
            .iter()
            .map(|a| {
                Ok(CompiledAlias {
                    pattern: compile("aliases", &a.pattern)?,
                    replacement: a.replacement.clone(),
                    uppercase: a.uppercase,
                })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;

        let product_patterns = tables
            .product_patterns
            .iter()
            .map(|p| compile("product_patterns", p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut key_noise_words = tables.brand_words.clone();
        key_noise_words.extend(tables.cosmetic_tokens.iter().cloned());

        Ok(Self {
            positive_keywords: lowercase_all(&tables.positive_keywords),
            buy_keywords: lowercase_all(&tables.buy_keywords),
            negative: word_alternation("negative_keywords", &tables.negative_keywords)?,
            reject_phrases,
            regions,
            stop_words: word_alternation("stop_words", &tables.stop_words)?,
            brand_present: word_alternation("brand_words", &tables.brand_words)?,
            brand_rules,
            aliases,
            product_patterns,
            key_noise: word_alternation("cosmetic_tokens", &key_noise_words)?,
        })
    }

    pub fn is_rejected_phrase(&self, text: &str) -> bool {
        self.reject_phrases.iter().any(|re| re.is_match(text))
    }

    pub fn has_negative_keyword(&self, text: &str) -> bool {
        self.negative.as_ref().map_or(false, |re| re.is_match(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AliasRule, RuleTables};

    #[test]
    fn default_tables_compile() {
        let rules = CompiledRules::compile(&RuleTables::default()).unwrap();
        assert!(rules.negative.is_some());
        assert_eq!(rules.regions.len(), RuleTables::default().regions.len());
    }

    #[test]
    fn invalid_pattern_names_its_table() {
        let mut tables = RuleTables::default();
        tables.product_patterns.push("(unclosed".to_string());

        let err = CompiledRules::compile(&tables).err().unwrap();
        let message = err.to_string();
        assert!(message.contains("product_patterns"), "{message}");
        assert!(message.contains("(unclosed"), "{message}");
    }

    #[test]
    fn uppercase_alias_expands_before_casing() {
        let alias = CompiledAlias {
            pattern: Regex::new(r"(\d{2})([a-z])\b").unwrap(),
            replacement: "${1}${2}".to_string(),
            uppercase: true,
        };
        assert_eq!(alias.apply("M60s"), "M60S");

        let rule = AliasRule {
            pattern: r"\bplus\b".to_string(),
            replacement: "+".to_string(),
            uppercase: false,
        };
        let compiled = CompiledAlias {
            pattern: compile("aliases", &rule.pattern).unwrap(),
            replacement: rule.replacement,
            uppercase: rule.uppercase,
        };
        assert_eq!(compiled.apply("S21 Plus"), "S21 +");
    }

    #[test]
    fn negative_keywords_match_whole_tokens_only() {
        let rules = CompiledRules::compile(&RuleTables::default()).unwrap();
        assert!(rules.has_negative_keyword("L7 9500M $4000"));
        assert!(rules.has_negative_keyword("S21 200T pre-order"));
        assert!(!rules.has_negative_keyword("S21 200T $3000"));
    }
}
