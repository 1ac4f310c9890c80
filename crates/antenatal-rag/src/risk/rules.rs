//! Validated threshold tables
//!
//! Each factor's rules are sorted into contiguous half-open bands
//! `[lower, upper)` covering the whole real line. The checks run once at
//! load; lookups are a binary search over the bands.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::SeverityTier;

const BUILTIN_TABLE: &str = include_str!("../../config/thresholds.toml");

/// One severity band for one factor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdRule {
    pub id: String,
    #[serde(rename = "factor")]
    pub factor_name: String,
    pub tier: SeverityTier,
    /// Inclusive; `None` means negative infinity
    #[serde(default, rename = "lower")]
    pub lower_bound: Option<f64>,
    /// Exclusive; `None` means positive infinity
    #[serde(default, rename = "upper")]
    pub upper_bound: Option<f64>,
    #[serde(default, rename = "recommendation")]
    pub recommendation_text: String,
}

impl ThresholdRule {
    pub fn contains(&self, value: f64) -> bool {
        self.lower_bound.map_or(true, |lo| value >= lo)
            && self.upper_bound.map_or(true, |hi| value < hi)
    }

    fn describe_interval(&self) -> String {
        let lo = self
            .lower_bound
            .map_or_else(|| "-inf".to_string(), |v| v.to_string());
        let hi = self
            .upper_bound
            .map_or_else(|| "+inf".to_string(), |v| v.to_string());
        format!("[{}, {})", lo, hi)
    }
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default, rename = "rule")]
    rules: Vec<ThresholdRule>,
}

/// Threshold rules grouped per factor, proven gap- and overlap-free
#[derive(Debug, Clone)]
pub struct RiskRuleSet {
    factors: BTreeMap<String, Vec<ThresholdRule>>,
    version: String,
}

impl RiskRuleSet {
    /// Validate and index `rules`
    pub fn load(rules: Vec<ThresholdRule>) -> Result<Self> {
        let mut ids = HashSet::new();
        for rule in &rules {
            validate_rule(rule)?;
            if !ids.insert(rule.id.as_str()) {
                return Err(Error::configuration(format!("duplicate rule id '{}'", rule.id)));
            }
        }

        let mut factors: BTreeMap<String, Vec<ThresholdRule>> = BTreeMap::new();
        for rule in rules {
            factors.entry(rule.factor_name.clone()).or_default().push(rule);
        }

        for (factor, bands) in factors.iter_mut() {
            bands.sort_by(|a, b| {
                let a = a.lower_bound.unwrap_or(f64::NEG_INFINITY);
                let b = b.lower_bound.unwrap_or(f64::NEG_INFINITY);
                a.total_cmp(&b)
            });
            check_coverage(factor, bands)?;
        }

        let version = digest(&factors);
        Ok(Self { factors, version })
    }

    /// Parse a TOML table of `[[rule]]` entries
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: RuleFile = toml::from_str(text)
            .map_err(|e| Error::configuration(format!("threshold table: {}", e)))?;
        Self::load(file.rules)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// The table shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_TABLE)
    }

    /// The band containing `value`
    pub fn lookup(&self, factor_name: &str, value: f64) -> Result<&ThresholdRule> {
        let bands = self
            .factors
            .get(factor_name)
            .ok_or_else(|| Error::UnknownFactor(factor_name.to_string()))?;
        if !value.is_finite() {
            return Err(Error::validation(format!("{} is not a finite number", factor_name)));
        }

        // The first band is unbounded below, so at least one band qualifies
        let idx = bands.partition_point(|r| r.lower_bound.map_or(true, |lo| lo <= value));
        Ok(&bands[idx - 1])
    }

    pub fn factors(&self) -> impl Iterator<Item = &str> {
        self.factors.keys().map(String::as_str)
    }

    /// Digest identifying this exact table
    pub fn version(&self) -> &str {
        &self.version
    }
}

fn validate_rule(rule: &ThresholdRule) -> Result<()> {
    if rule.id.trim().is_empty() {
        return Err(Error::configuration("rule id must not be empty"));
    }
    if rule.factor_name.trim().is_empty() {
        return Err(Error::configuration(format!("rule '{}' has no factor", rule.id)));
    }
    for bound in [rule.lower_bound, rule.upper_bound].into_iter().flatten() {
        if !bound.is_finite() {
            return Err(Error::configuration(format!(
                "rule '{}' has a non-finite bound; omit it for an open interval",
                rule.id
            )));
        }
    }
    if let (Some(lo), Some(hi)) = (rule.lower_bound, rule.upper_bound) {
        if lo >= hi {
            return Err(Error::configuration(format!(
                "rule '{}' has an empty interval {}",
                rule.id,
                rule.describe_interval()
            )));
        }
    }
    Ok(())
}

/// Sorted bands must start at -inf, end at +inf and meet exactly
fn check_coverage(factor: &str, bands: &[ThresholdRule]) -> Result<()> {
    let (Some(first), Some(last)) = (bands.first(), bands.last()) else {
        return Ok(());
    };

    if first.lower_bound.is_some() {
        return Err(Error::configuration(format!(
            "{}: values below {} are not covered",
            factor,
            first.describe_interval()
        )));
    }
    if last.upper_bound.is_some() {
        return Err(Error::configuration(format!(
            "{}: values above {} are not covered",
            factor,
            last.describe_interval()
        )));
    }

    for pair in bands.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        match (prev.upper_bound, next.lower_bound) {
            (Some(hi), Some(lo)) if hi == lo => {}
            (Some(hi), Some(lo)) if hi < lo => {
                return Err(Error::configuration(format!(
                    "{}: gap between '{}' {} and '{}' {}",
                    factor,
                    prev.id,
                    prev.describe_interval(),
                    next.id,
                    next.describe_interval()
                )));
            }
            _ => {
                return Err(Error::configuration(format!(
                    "{}: '{}' {} overlaps '{}' {}",
                    factor,
                    prev.id,
                    prev.describe_interval(),
                    next.id,
                    next.describe_interval()
                )));
            }
        }
    }
    Ok(())
}

fn digest(factors: &BTreeMap<String, Vec<ThresholdRule>>) -> String {
    let mut hasher = Sha256::new();
    for rule in factors.values().flatten() {
        hasher.update(
            format!(
                "{}|{}|{}|{:?}|{:?}|{}\n",
                rule.id,
                rule.factor_name,
                rule.tier,
                rule.lower_bound,
                rule.upper_bound,
                rule.recommendation_text
            )
            .as_bytes(),
        );
    }
    format!("sha256:{}", &hex::encode(hasher.finalize())[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rule(id: &str, tier: SeverityTier, lower: Option<f64>, upper: Option<f64>) -> ThresholdRule {
        ThresholdRule {
            id: id.to_string(),
            factor_name: "systolic_bp".to_string(),
            tier,
            lower_bound: lower,
            upper_bound: upper,
            recommendation_text: String::new(),
        }
    }

    #[test]
    fn test_builtin_table_loads() {
        let rules = RiskRuleSet::builtin().unwrap();
        let factors: Vec<_> = rules.factors().collect();
        assert_eq!(
            factors,
            vec!["blood_glucose", "diastolic_bp", "heart_rate", "systolic_bp", "temperature"]
        );
        assert!(rules.version().starts_with("sha256:"));
    }

    #[test]
    fn test_lookup_boundaries_are_lower_inclusive() {
        let rules = RiskRuleSet::builtin().unwrap();
        assert_eq!(rules.lookup("systolic_bp", 139.9).unwrap().tier, SeverityTier::Normal);
        assert_eq!(rules.lookup("systolic_bp", 140.0).unwrap().tier, SeverityTier::Elevated);
        assert_eq!(rules.lookup("systolic_bp", 160.0).unwrap().id, "sbp-severe");
        assert_eq!(rules.lookup("systolic_bp", -5.0).unwrap().id, "sbp-low");
    }

    #[test]
    fn test_unknown_factor() {
        let rules = RiskRuleSet::builtin().unwrap();
        assert!(matches!(rules.lookup("weight", 70.0), Err(Error::UnknownFactor(_))));
    }

    #[test]
    fn test_rejects_gap() {
        let err = RiskRuleSet::load(vec![
            rule("low", SeverityTier::Normal, None, Some(140.0)),
            rule("high", SeverityTier::Elevated, Some(141.0), None),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("gap")));
    }

    #[test]
    fn test_rejects_overlap() {
        let err = RiskRuleSet::load(vec![
            rule("low", SeverityTier::Normal, None, Some(150.0)),
            rule("high", SeverityTier::Elevated, Some(140.0), None),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("overlaps")));
    }

    #[test]
    fn test_rejects_open_ends() {
        assert!(RiskRuleSet::load(vec![rule("a", SeverityTier::Normal, Some(0.0), None)]).is_err());
        assert!(RiskRuleSet::load(vec![rule("a", SeverityTier::Normal, None, Some(0.0))]).is_err());
        assert!(RiskRuleSet::load(vec![rule("a", SeverityTier::Normal, None, None)]).is_ok());
    }

    #[test]
    fn test_rejects_malformed_rules() {
        let empty_interval = rule("a", SeverityTier::Normal, Some(5.0), Some(5.0));
        assert!(RiskRuleSet::load(vec![empty_interval]).is_err());

        let infinite = rule("a", SeverityTier::Normal, None, Some(f64::INFINITY));
        assert!(RiskRuleSet::load(vec![infinite]).is_err());

        let dup = vec![
            rule("a", SeverityTier::Normal, None, Some(1.0)),
            rule("a", SeverityTier::Caution, Some(1.0), None),
        ];
        assert!(matches!(RiskRuleSet::load(dup), Err(Error::Configuration(_))));

        assert!(matches!(
            RiskRuleSet::from_toml("[[rule]]\nid = 3"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_version_tracks_content() {
        let a = RiskRuleSet::load(vec![rule("a", SeverityTier::Normal, None, None)]).unwrap();
        let b = RiskRuleSet::load(vec![rule("a", SeverityTier::Caution, None, None)]).unwrap();
        let a2 = RiskRuleSet::load(vec![rule("a", SeverityTier::Normal, None, None)]).unwrap();
        assert_ne!(a.version(), b.version());
        assert_eq!(a.version(), a2.version());
    }

    fn tier_strategy() -> impl Strategy<Value = SeverityTier> {
        prop_oneof![
            Just(SeverityTier::Normal),
            Just(SeverityTier::Caution),
            Just(SeverityTier::Elevated),
            Just(SeverityTier::Critical),
        ]
    }

    /// Contiguous bands from distinct sorted cut points, shuffled by reversal
    fn bands_from(cuts: &[f64], tiers: &[SeverityTier]) -> Vec<ThresholdRule> {
        let mut bounds: Vec<Option<f64>> = vec![None];
        bounds.extend(cuts.iter().map(|c| Some(*c)));
        bounds.push(None);

        let mut rules: Vec<ThresholdRule> = bounds
            .windows(2)
            .enumerate()
            .map(|(i, w)| rule(&format!("r{}", i), tiers[i % tiers.len()], w[0], w[1]))
            .collect();
        rules.reverse();
        rules
    }

    proptest! {
        #[test]
        fn prop_every_value_maps_to_exactly_one_band(
            mut cuts in prop::collection::vec(-500.0f64..500.0, 0..8),
            tiers in prop::collection::vec(tier_strategy(), 1..5),
            samples in prop::collection::vec(-1000.0f64..1000.0, 1..20),
        ) {
            cuts.sort_by(|a, b| a.total_cmp(b));
            cuts.dedup();
            let rules = bands_from(&cuts, &tiers);
            let set = RiskRuleSet::load(rules.clone()).unwrap();

            let mut points = samples;
            for c in &cuts {
                points.extend([*c, c.next_down_compat(), c.next_up_compat()]);
            }

            for v in points {
                let containing: Vec<_> = rules.iter().filter(|r| r.contains(v)).collect();
                prop_assert_eq!(containing.len(), 1);
                prop_assert_eq!(&set.lookup("systolic_bp", v).unwrap().id, &containing[0].id);
            }
        }

        #[test]
        fn prop_shifted_cut_is_rejected(
            mut cuts in prop::collection::vec(-500.0f64..500.0, 1..8),
            shift in prop_oneof![-10.0f64..-0.001, 0.001f64..10.0],
            which in 0usize..8,
        ) {
            cuts.sort_by(|a, b| a.total_cmp(b));
            cuts.dedup();
            let mut rules = bands_from(&cuts, &[SeverityTier::Normal]);
            rules.reverse();

            // Move one band's upper edge without moving the neighbour's lower edge
            let i = which % cuts.len();
            let moved = rules[i].upper_bound.map(|u| u + shift);
            rules[i].upper_bound = moved;
            let empty = matches!((rules[i].lower_bound, moved), (Some(lo), Some(hi)) if lo >= hi);

            let result = RiskRuleSet::load(rules);
            prop_assert!(result.is_err(), "accepted a gap or overlap (empty band: {})", empty);
        }
    }

    /// `f64::next_up`/`next_down` without requiring a recent toolchain
    trait NextFloat {
        fn next_up_compat(self) -> f64;
        fn next_down_compat(self) -> f64;
    }

    impl NextFloat for f64 {
        fn next_up_compat(self) -> f64 {
            if self == 0.0 {
                return f64::from_bits(1);
            }
            let bits = self.to_bits();
            f64::from_bits(if self > 0.0 { bits + 1 } else { bits - 1 })
        }

        fn next_down_compat(self) -> f64 {
            -(-self).next_up_compat()
        }
    }
}
