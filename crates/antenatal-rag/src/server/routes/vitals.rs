//! Vitals assessment endpoint

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{RiskAssessmentResult, VitalsSnapshot};

#[derive(Debug, Serialize)]
pub struct AssessResponse {
    #[serde(flatten)]
    pub result: RiskAssessmentResult,
    pub interpretation: &'static str,
    /// Factors at caution or above
    pub flagged_factors: Vec<String>,
}

/// POST /api/vitals/assess - Grade a vitals snapshot
///
/// Non-numeric or implausible values are rejected with 400 before
/// evaluation. The overall severity is remembered for later chat prompts.
pub async fn assess_vitals(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<AssessResponse>> {
    let snapshot = VitalsSnapshot::from_json(&body, Utc::now())?;
    let result = state.assistant().assess(&snapshot.patient_id, &snapshot)?;

    state.record_risk(&result.patient_id, result.overall_severity);
    let flagged_factors: Vec<String> = result
        .flagged_factors()
        .map(|f| f.factor_name.clone())
        .collect();
    tracing::info!(
        patient_id = %result.patient_id,
        overall = %result.overall_severity,
        flagged = ?flagged_factors,
        "Vitals assessed"
    );

    Ok(Json(AssessResponse {
        interpretation: result.interpretation(),
        flagged_factors,
        result,
    }))
}
