//! Risk assessment result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity tiers, ordered `Normal < Caution < Elevated < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Normal,
    Caution,
    Elevated,
    Critical,
}

impl SeverityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Caution => "caution",
            Self::Elevated => "elevated",
            Self::Critical => "critical",
        }
    }

    /// Clinical interpretation line for an overall result at this tier
    pub fn interpretation(&self) -> &'static str {
        match self {
            Self::Normal => "Vitals are within normal limits.",
            Self::Caution => "Borderline values detected. Recheck at the next visit.",
            Self::Elevated => "Abnormal values detected. Monitoring recommended.",
            Self::Critical => "Critical values detected. Immediate attention required.",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one evaluated vital sign
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactorResult {
    pub factor_name: String,
    pub measured_value: f64,
    pub severity_tier: SeverityTier,
    /// Identifier of the threshold rule whose interval contains the value
    pub rule_id_triggered: String,
}

/// Result of evaluating one vitals snapshot. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessmentResult {
    pub patient_id: String,
    /// Maximum tier across `factor_results`
    pub overall_severity: SeverityTier,
    /// One entry per evaluated factor, in canonical vitals order
    pub factor_results: Vec<RiskFactorResult>,
    /// Deduplicated, by descending severity then factor name
    pub recommendations: Vec<String>,
    /// Timestamp of the evaluated measurements
    pub evaluated_at: DateTime<Utc>,
    /// Digest of the rule table used for this evaluation
    pub rule_version: String,
}

impl RiskAssessmentResult {
    pub fn interpretation(&self) -> &'static str {
        self.overall_severity.interpretation()
    }

    /// Factors at `caution` or above
    pub fn flagged_factors(&self) -> impl Iterator<Item = &RiskFactorResult> {
        self.factor_results
            .iter()
            .filter(|f| f.severity_tier >= SeverityTier::Caution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(SeverityTier::Normal < SeverityTier::Caution);
        assert!(SeverityTier::Caution < SeverityTier::Elevated);
        assert!(SeverityTier::Elevated < SeverityTier::Critical);
        assert_eq!(
            [SeverityTier::Caution, SeverityTier::Critical, SeverityTier::Normal]
                .into_iter()
                .max(),
            Some(SeverityTier::Critical)
        );
    }

    #[test]
    fn test_tier_serde_is_lowercase() {
        let tier: SeverityTier = serde_json::from_str("\"elevated\"").unwrap();
        assert_eq!(tier, SeverityTier::Elevated);
        assert_eq!(serde_json::to_string(&SeverityTier::Critical).unwrap(), "\"critical\"");
    }
}
