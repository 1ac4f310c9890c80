//! Threshold-based vitals risk assessment

mod engine;
mod rules;

pub use engine::{RiskEngine, COLLECT_VITALS};
pub use rules::{RiskRuleSet, ThresholdRule};
