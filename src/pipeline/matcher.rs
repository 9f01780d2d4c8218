use regex::Regex;
use std::cmp::Ordering;
use tracing::debug;

use super::aggregate::name_core;
use crate::models::{AggregatedGroup, CanonicalCatalog, CanonicalSpec, PowerSource};
use crate::rules::CompiledRules;

/// Reference hash-rate may differ from the listing's by at most this share
/// for a fuzzy name match to count.
const MAX_HASHRATE_DEVIATION: f64 = 0.25;

/// Looks listing names up in the reference catalog to backfill power.
pub struct CatalogMatcher {
    entries: Vec<(String, CanonicalSpec)>,
    noise: Option<Regex>,
    threshold: f64,
}

fn hashrate_distance(spec: &CanonicalSpec, hashrate_th: f64) -> f64 {
    (spec.hashrate_th - hashrate_th).abs()
}

impl CatalogMatcher {
    pub fn new(catalog: &CanonicalCatalog, rules: &CompiledRules, threshold: f64) -> Self {
        let noise = rules.key_noise.clone();
        let entries = catalog
            .specs
            .iter()
            .map(|spec| (name_core(&spec.name, noise.as_ref()), spec.clone()))
            .filter(|(core, _)| !core.is_empty())
            .collect();

        Self {
            entries,
            noise,
            threshold,
        }
    }

    /// Best reference entry for a listing name. Exact normalized names win;
    /// otherwise the most similar name with a compatible hash-rate.
    pub fn find(&self, name: &str, hashrate_th: f64) -> Option<&CanonicalSpec> {
        let core = name_core(name, self.noise.as_ref());
        if core.is_empty() {
            return None;
        }

        let nearest = |a: &&(String, CanonicalSpec), b: &&(String, CanonicalSpec)| {
            hashrate_distance(&a.1, hashrate_th)
                .partial_cmp(&hashrate_distance(&b.1, hashrate_th))
                .unwrap_or(Ordering::Equal)
        };

        let exact = self
            .entries
            .iter()
            .filter(|(entry_core, _)| *entry_core == core)
            .min_by(nearest);
        if let Some((_, spec)) = exact {
            return Some(spec);
        }

        self.entries
            .iter()
            .filter(|(_, spec)| {
                spec.hashrate_th > 0.0
                    && hashrate_distance(spec, hashrate_th) / spec.hashrate_th <= MAX_HASHRATE_DEVIATION
            })
            .map(|entry| (strsim::jaro_winkler(&core, &entry.0), entry))
            .filter(|(score, _)| *score >= self.threshold)
            .max_by(|(score_a, a), (score_b, b)| {
                score_a
                    .partial_cmp(score_b)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| nearest(b, a))
            })
            .map(|(_, (_, spec))| spec)
    }

    /// Fill power for groups that parsed none. Groups without a match stay
    /// `Estimated`.
    pub fn enrich(&self, groups: &mut [AggregatedGroup]) {
        for group in groups.iter_mut().filter(|g| g.power_watts.is_none()) {
            match self.find(&group.display_name, group.hashrate_th as f64) {
                Some(spec) => {
                    debug!("Matched {} to catalog entry {}", group.display_name, spec.name);
                    group.power_watts = Some(spec.power_watts);
                    group.power_source = PowerSource::Catalog;
                }
                None => group.power_source = PowerSource::Estimated,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleTables;
    use crate::models::{GroupKey, GroupStats};

    fn spec(name: &str, hashrate_th: f64, power_watts: u32) -> CanonicalSpec {
        CanonicalSpec {
            name: name.to_string(),
            hashrate_th,
            power_watts,
        }
    }

    fn matcher() -> CatalogMatcher {
        let catalog = CanonicalCatalog::new(vec![
            spec("Antminer S21", 200.0, 3500),
            spec("Antminer S21+", 216.0, 3564),
            spec("Antminer S21+ Hydro", 319.0, 4785),
            spec("Antminer S21+ Hydro", 395.0, 5925),
            spec("Antminer S21 XP Hydro", 473.0, 5676),
            spec("Whatsminer M60S", 186.0, 3441),
        ]);
        let rules = CompiledRules::compile(&RuleTables::default()).unwrap();
        CatalogMatcher::new(&catalog, &rules, 0.92)
    }

    #[test]
    fn exact_match_ignores_brand_and_case() {
        let matcher = matcher();
        assert_eq!(matcher.find("s21", 200.0).unwrap().power_watts, 3500);
        assert_eq!(matcher.find("Whatsminer M60S", 186.0).unwrap().power_watts, 3441);
    }

    #[test]
    fn exact_match_prefers_nearest_hashrate() {
        let matcher = matcher();
        assert_eq!(matcher.find("Antminer S21+ Hydro", 395.0).unwrap().power_watts, 5925);
        assert_eq!(matcher.find("Antminer S21+ Hydro", 330.0).unwrap().power_watts, 4785);
    }

    #[test]
    fn fuzzy_match_tolerates_alias_variance() {
        let matcher = matcher();
        let found = matcher.find("Antminer S21 XP Hydr", 473.0).unwrap();
        assert_eq!(found.name, "Antminer S21 XP Hydro");
    }

    #[test]
    fn fuzzy_match_rejects_distant_hashrates() {
        let matcher = matcher();
        assert!(matcher.find("Antminer S21 XP Hydr", 270.0).is_none());
        assert!(matcher.find("RTX 4090", 200.0).is_none());
    }

    #[test]
    fn enrich_only_fills_missing_power() {
        let matcher = matcher();
        let base = AggregatedGroup {
            key: GroupKey("s21_200".to_string()),
            display_name: "Antminer S21".to_string(),
            hashrate_th: 200,
            listings: Vec::new(),
            stats: GroupStats::from_prices(&[3000]).unwrap(),
            power_watts: None,
            power_source: PowerSource::Estimated,
        };
        let parsed = AggregatedGroup {
            power_watts: Some(3400),
            power_source: PowerSource::Parsed,
            ..base.clone()
        };
        let unknown = AggregatedGroup {
            display_name: "Antminer S23".to_string(),
            ..base.clone()
        };

        let mut groups = vec![base, parsed, unknown];
        matcher.enrich(&mut groups);

        assert_eq!(groups[0].power_watts, Some(3500));
        assert_eq!(groups[0].power_source, PowerSource::Catalog);
        assert_eq!(groups[1].power_watts, Some(3400));
        assert_eq!(groups[1].power_source, PowerSource::Parsed);
        assert_eq!(groups[2].power_watts, None);
        assert_eq!(groups[2].power_source, PowerSource::Estimated);
    }
}
