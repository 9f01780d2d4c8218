use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "config/default";
pub const ENV_CONFIG_FILE: &str = "ASIC_MONITOR_CONFIG";
pub const ENV_PREFIX: &str = "ASIC_MONITOR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channels: Vec<ChannelConfig>,
    pub check_interval_seconds: u64,
    pub run_once: bool,
    pub user_agent: String,
    pub telegram_base_url: String,
    pub message_limit: usize,
    pub max_retries: u32,
    pub database_path: String,
    pub catalog_path: String,
    pub pipeline: PipelineSettings,
    pub rules: RuleTables,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Public handle, as in `t.me/<handle>`.
    pub handle: String,
    /// Display title used as the listing source. Falls back to the title
    /// scraped from the channel page, then to the handle.
    #[serde(default)]
    pub title: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            check_interval_seconds: 1800,
            run_once: false,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36".to_string(),
            telegram_base_url: "https://t.me".to_string(),
            message_limit: 100,
            max_retries: 3,
            database_path: "asic_price_monitor.db".to_string(),
            catalog_path: "data/miners.json".to_string(),
            pipeline: PipelineSettings::default(),
            rules: RuleTables::default(),
        }
    }
}

impl Config {
    /// Layers built-in defaults, `config/default.toml`, the file named by
    /// `ASIC_MONITOR_CONFIG` and `ASIC_MONITOR__*` environment variables.
    pub fn load() -> Result<Self> {
        let mut builder = ::config::Config::builder()
            .add_source(::config::File::with_name(DEFAULT_CONFIG_FILE).required(false));

        if let Ok(path) = std::env::var(ENV_CONFIG_FILE) {
            builder = builder.add_source(::config::File::with_name(&path).required(true));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to assemble configuration")?;

        settings
            .try_deserialize::<Config>()
            .context("Failed to deserialize configuration")
    }
}

/// Numeric knobs of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Messages older than this (relative to ingest time) are skipped.
    pub max_message_age_hours: i64,
    pub lot_price: LotPriceHeuristic,
    /// Values of a slash/hyphen run at or below this are not hash-rates.
    pub min_multi_hashrate: f64,
    /// Entries priced beyond `median * ratio` or below `median / ratio` are
    /// flagged as outliers.
    pub outlier_ratio: f64,
    /// Minimum Jaro-Winkler similarity for a fuzzy catalog match.
    pub catalog_match_threshold: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_message_age_hours: 72,
            lot_price: LotPriceHeuristic::default(),
            min_multi_hashrate: 20.0,
            outlier_ratio: 2.0,
            catalog_match_threshold: 0.92,
        }
    }
}

/// Turns a lot total into a unit price. The band has no documented
/// derivation and needs review by someone who trades these machines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LotPriceHeuristic {
    pub min_total: f64,
    pub unit_floor: f64,
    pub unit_ceiling: f64,
}

impl Default for LotPriceHeuristic {
    fn default() -> Self {
        Self {
            min_total: 5000.0,
            unit_floor: 50.0,
            unit_ceiling: 15000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRule {
    pub pattern: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandRule {
    pub pattern: String,
    pub brand: String,
}

/// One ordered substitution of the name canonicalizer. With `uppercase` set
/// the expanded replacement is upper-cased before insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasRule {
    pub pattern: String,
    pub replacement: String,
    #[serde(default)]
    pub uppercase: bool,
}

impl AliasRule {
    fn new(pattern: &str, replacement: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
            uppercase: false,
        }
    }

    fn upper(pattern: &str, replacement: &str) -> Self {
        Self {
            uppercase: true,
            ..Self::new(pattern, replacement)
        }
    }
}

/// Every table the pipeline consults. Patterns are matched case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTables {
    pub positive_keywords: Vec<String>,
    pub buy_keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    pub reject_phrases: Vec<String>,
    pub regions: Vec<RegionRule>,
    pub stop_words: Vec<String>,
    pub brand_words: Vec<String>,
    pub brand_rules: Vec<BrandRule>,
    pub aliases: Vec<AliasRule>,
    pub product_patterns: Vec<String>,
    pub cosmetic_tokens: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn region(pattern: &str, tag: &str) -> RegionRule {
    RegionRule {
        pattern: pattern.to_string(),
        tag: tag.to_string(),
    }
}

fn brand(pattern: &str, brand: &str) -> BrandRule {
    BrandRule {
        pattern: pattern.to_string(),
        brand: brand.to_string(),
    }
}

const MONTHS: &[&str] = &[
    "jan", "january", "feb", "february", "mar", "march", "apr", "april", "may", "jun", "june",
    "jul", "july", "aug", "august", "sep", "sept", "september", "oct", "october", "nov",
    "november", "dec", "december",
];

impl Default for RuleTables {
    fn default() -> Self {
        let mut negative_keywords = strings(&[
            // other algorithms and their machines
            "l7", "l9", "l3", "ks0", "ks3", "ks5", "ks7", "ka3", "k7", "d7", "d9", "e9", "al1",
            "al3", "dr5", "dr7", "z15", "hs3", "ltc", "doge", "kaspa", "kas", "etchash", "ethw",
            "zec", "scrypt", "alephium", "iceriver", "goldshell", "jasminer", "elphapex",
            // stock that does not exist yet
            "future", "futures", "pre-order", "preorder", "pre order", "batch",
        ]);
        negative_keywords.extend(strings(MONTHS));

        let mut stop_words = strings(&[
            "moq", "doa", "warranty", "working", "condition", "lot", "batch", "stock", "spot",
            "new", "used", "refurb", "refurbished", "for sale", "selling", "available", "now",
            "price", "each", "ready", "ship", "shipping", "ddp", "fob", "in", "hk", "usa",
            "with", "psu", "only", "per",
        ]);
        stop_words.extend(strings(MONTHS));

        Self {
            positive_keywords: strings(&[
                "s19", "s21", "s23", "t19", "t21", "m30", "m31", "m33", "m50", "m53", "m56",
                "m60", "m63", "m66", "m70", "a12", "a13", "a14", "a15", "a16", "antminer",
                "whatsminer", "avalon", "sealminer",
            ]),
            buy_keywords: strings(&["wtb", "want to buy", "looking to buy", "we buy", "buying"]),
            negative_keywords,
            reject_phrases: strings(&[
                r"ex[\s\-]*factory",
                r"future\s+batch",
                r"est\.?\s*date",
                // YYMM delivery codes, 2025 through 2029
                r"\b2[5-9](?:0[1-9]|1[0-2])\b",
            ]),
            regions: vec![
                region(r"hong\s*kong|\bhk\b", "HK"),
                region(r"\busa\b|united\s+states", "US"),
                region(r"china|mainland|shenzhen|\bcn\b", "CN"),
                region(r"russia|moscow|\bru\b", "RU"),
                region(r"dubai|\buae\b", "UAE"),
                region(r"malaysia", "MY"),
                region(r"kazakhstan|\bkz\b", "KZ"),
                region(r"ethiopia", "ET"),
                region(r"paraguay", "PY"),
                region(r"canada", "CA"),
                region(r"europe|\beu\b", "EU"),
            ],
            stop_words,
            brand_words: strings(&[
                "antminer", "bitmain", "whatsminer", "microbt", "avalon", "canaan", "sealminer",
                "bitdeer", "auradine", "teraflux",
            ]),
            brand_rules: vec![
                brand(r"^(?:[stlkde]\d{1,3}|u3|b19)", "Antminer"),
                brand(r"^m\d{2}", "Whatsminer"),
                brand(r"^a\d{3,4}", "Avalon"),
            ],
            aliases: vec![
                // Brand spellings first so later rules only see the display brands.
                AliasRule::new(r"\bbitmain\s+antminer\b", "Antminer"),
                AliasRule::new(r"\bbitmain\b", "Antminer"),
                AliasRule::new(r"\bmicrobt\b", "Whatsminer"),
                AliasRule::new(r"\bcanaan\b", "Avalon"),
                // Must precede the hyd rule, which would turn `hydxp` into `Hydroxp`.
                AliasRule::new(r"\b(?:xph|hxp|xphyd|hydxp)\b", "XP Hydro"),
                // Glued or spaced `hyd`/`hydro`; leaves doubled spaces for the final collapse.
                AliasRule::new(r"\s*hyd(?:ro)?\.?", " Hydro"),
                // Concatenated dual-model artifacts such as `S21T21`.
                AliasRule::new(r"\b([st]\d{2})([st]\d{2})\b", "${1} ${2}"),
                // Glued qualifiers (`S21XP`). Runs before casing so `xp` is not read
                // as a variant letter.
                AliasRule::new(r"\b([st]\d{2})(xp|pro)\b", "${1} ${2}"),
                // `Plus` must become `+` before detached pluses are re-attached.
                AliasRule::new(r"\bplus\b", "+"),
                AliasRule::new(r"(\d{2}[a-z]?)\s+(\+{1,2})", "${1}${2}"),
                AliasRule::new(r"\bxp\b", "XP"),
                AliasRule::new(r"\bpro\b", "Pro"),
                AliasRule::new(r"\bimm(?:ersion)?\b", "Immersion"),
                // Model letter casing (`s21` -> `S21`).
                AliasRule::upper(r"\b([a-z])(\d{2,4})", "${1}${2}"),
                // Variant letter casing, only right after a 2-3 digit model number.
                AliasRule::upper(r"(^|[^\d])(\d{2,3})([a-z])\b", "${1}${2}${3}"),
            ],
            product_patterns: strings(&[
                r"\bS(?:19|21|23)",
                r"\bT(?:19|21)",
                r"\bM(?:3\d|5\d|6\d|7\d)",
                r"\bA1[1-6]\d{2}",
                r"\b(?:sealminer|teraflux|auradine)\b",
            ]),
            cosmetic_tokens: strings(&["miner", "asic", "btc", "bitcoin"]),
        }
    }
}
