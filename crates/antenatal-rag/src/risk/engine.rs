//! Vitals risk evaluation

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Error;
use crate::types::{RiskAssessmentResult, RiskFactorResult, SeverityTier, VitalsSnapshot};

use super::rules::RiskRuleSet;

/// Recommendation when a snapshot carries no measurements
pub const COLLECT_VITALS: &str =
    "No vitals recorded. Collect blood pressure, heart rate, blood glucose and temperature readings.";

/// Evaluates snapshots against a loaded rule table. Holds no mutable state,
/// so one engine can serve any number of concurrent evaluations.
#[derive(Clone)]
pub struct RiskEngine {
    rules: Arc<RiskRuleSet>,
}

impl RiskEngine {
    pub fn new(rules: Arc<RiskRuleSet>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RiskRuleSet {
        &self.rules
    }

    /// Evaluate every present measurement that has configured rules.
    ///
    /// Recommendations come from factors at `caution` or above, ordered by
    /// descending tier, then factor name, and deduplicated by text. The
    /// result depends only on the snapshot and the rule table.
    pub fn evaluate(&self, snapshot: &VitalsSnapshot) -> RiskAssessmentResult {
        let mut factor_results = Vec::new();
        let mut flagged: Vec<(SeverityTier, &str, &str)> = Vec::new();

        for (factor, value) in snapshot.measurements() {
            match self.rules.lookup(factor, value) {
                Ok(rule) => {
                    if rule.tier >= SeverityTier::Caution && !rule.recommendation_text.is_empty() {
                        flagged.push((rule.tier, factor, rule.recommendation_text.as_str()));
                    }
                    factor_results.push(RiskFactorResult {
                        factor_name: factor.to_string(),
                        measured_value: value,
                        severity_tier: rule.tier,
                        rule_id_triggered: rule.id.clone(),
                    });
                }
                Err(Error::UnknownFactor(_)) => {
                    tracing::trace!(factor, "No rules configured, skipping");
                }
                Err(e) => {
                    tracing::warn!(factor, value, error = %e, "Skipping unusable measurement");
                }
            }
        }

        let overall_severity = factor_results
            .iter()
            .map(|r| r.severity_tier)
            .max()
            .unwrap_or(SeverityTier::Normal);

        let recommendations = if factor_results.is_empty() {
            vec![COLLECT_VITALS.to_string()]
        } else {
            // Stable sort: equal tier and factor keep rule order
            flagged.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
            let mut seen = HashSet::new();
            flagged
                .into_iter()
                .filter(|(_, _, text)| seen.insert(*text))
                .map(|(_, _, text)| text.to_string())
                .collect()
        };

        tracing::debug!(
            patient_id = %snapshot.patient_id,
            evaluated = factor_results.len(),
            overall = %overall_severity,
            "Risk assessment complete"
        );

        RiskAssessmentResult {
            patient_id: snapshot.patient_id.clone(),
            overall_severity,
            factor_results,
            recommendations,
            evaluated_at: snapshot.recorded_at,
            rule_version: self.rules.version().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::ThresholdRule;
    use chrono::{TimeZone, Utc};

    fn engine() -> RiskEngine {
        RiskEngine::new(Arc::new(RiskRuleSet::builtin().unwrap()))
    }

    fn snapshot() -> VitalsSnapshot {
        VitalsSnapshot::empty("p-1", Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap())
    }

    #[test]
    fn test_empty_snapshot_is_normal() {
        let result = engine().evaluate(&snapshot());
        assert_eq!(result.overall_severity, SeverityTier::Normal);
        assert!(result.factor_results.is_empty());
        assert_eq!(result.recommendations, vec![COLLECT_VITALS.to_string()]);
    }

    #[test]
    fn test_critical_systolic_with_custom_rule() {
        let rule = |id: &str, tier, lo, hi, text: &str| ThresholdRule {
            id: id.to_string(),
            factor_name: "systolic_bp".to_string(),
            tier,
            lower_bound: lo,
            upper_bound: hi,
            recommendation_text: text.to_string(),
        };
        let rules = RiskRuleSet::load(vec![
            rule("sbp-ok", SeverityTier::Normal, None, Some(160.0), ""),
            rule("sbp-crit", SeverityTier::Critical, Some(160.0), None, "seek immediate care"),
        ])
        .unwrap();

        let mut vitals = snapshot();
        vitals.systolic_bp = Some(170.0);
        let result = RiskEngine::new(Arc::new(rules)).evaluate(&vitals);

        assert_eq!(result.factor_results.len(), 1);
        assert_eq!(result.factor_results[0].factor_name, "systolic_bp");
        assert_eq!(result.factor_results[0].severity_tier, SeverityTier::Critical);
        assert_eq!(result.factor_results[0].rule_id_triggered, "sbp-crit");
        assert!(result.recommendations.contains(&"seek immediate care".to_string()));
    }

    #[test]
    fn test_overall_is_max_and_recommendations_ordered() {
        let mut vitals = snapshot();
        vitals.heart_rate = Some(105.0); // caution
        vitals.blood_glucose = Some(150.0); // elevated
        vitals.temperature = Some(39.8); // critical
        vitals.systolic_bp = Some(120.0); // normal

        let result = engine().evaluate(&vitals);
        assert_eq!(result.overall_severity, SeverityTier::Critical);

        let factors: Vec<_> = result.factor_results.iter().map(|f| f.factor_name.as_str()).collect();
        assert_eq!(factors, vec!["systolic_bp", "heart_rate", "blood_glucose", "temperature"]);

        assert_eq!(
            result.recommendations,
            vec![
                "High fever. Seek immediate care.".to_string(),
                "High glucose level. Gestational diabetes risk. Arrange a glucose tolerance test."
                    .to_string(),
                "Fast heart rate (tachycardia). Rest, hydrate and recheck in one hour.".to_string(),
            ]
        );
    }

    #[test]
    fn test_shared_recommendation_text_appears_once() {
        let mut vitals = snapshot();
        vitals.systolic_bp = Some(150.0);
        vitals.diastolic_bp = Some(95.0);

        let result = engine().evaluate(&vitals);
        assert_eq!(result.factor_results.len(), 2);
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.overall_severity, SeverityTier::Elevated);
    }

    #[test]
    fn test_unconfigured_factors_are_skipped() {
        let mut vitals = snapshot();
        vitals.weight = Some(72.0);
        vitals.gestational_week = Some(28.0);
        vitals.heart_rate = Some(80.0);

        let result = engine().evaluate(&vitals);
        assert_eq!(result.factor_results.len(), 1);
        assert_eq!(result.overall_severity, SeverityTier::Normal);
        assert!(result.recommendations.is_empty());
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let mut vitals = snapshot();
        vitals.systolic_bp = Some(145.0);
        vitals.heart_rate = Some(55.0);
        vitals.temperature = Some(37.7);

        let engine = engine();
        let first = engine.evaluate(&vitals);
        for _ in 0..10 {
            assert_eq!(engine.evaluate(&vitals), first);
        }
        assert_eq!(first.evaluated_at, vitals.recorded_at);
        assert_eq!(first.rule_version, engine.rules().version());
    }
}
