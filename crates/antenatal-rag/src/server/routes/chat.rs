//! Chat endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::ConversationTurn;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub patient_id: String,
    pub question: String,
    /// Current week of pregnancy, if the client knows it
    #[serde(default)]
    pub gestational_week: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub patient_id: String,
    #[serde(flatten)]
    pub turn: ConversationTurn,
    /// Citations rendered for display, e.g. `[Source: who-anc-2016, Page 42]`
    pub sources: Vec<String>,
    pub processing_time_ms: u64,
}

/// POST /api/chat - Answer a question and append it to the patient's history
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let start = Instant::now();
    let patient_id = request.patient_id.trim();
    if patient_id.is_empty() {
        return Err(Error::validation("patient_id is required"));
    }

    let history = state
        .conversations()
        .recent(patient_id, state.config().server.history_turns)
        .await?;
    let context = state.patient_context(patient_id, request.gestational_week);

    let turn = match state
        .assistant()
        .ask_with_context(patient_id, &request.question, &history, &context)
        .await
    {
        Ok(turn) => turn,
        Err(e) => {
            if e.is_request_scoped() {
                tracing::warn!(patient_id, error = %e, "Chat request could not be answered");
            }
            return Err(e);
        }
    };

    state.conversations().append(patient_id, turn.clone()).await?;

    let sources = turn.citations().iter().map(|c| c.format_inline()).collect();
    Ok(Json(ChatResponse {
        patient_id: patient_id.to_string(),
        sources,
        turn,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// GET /api/conversations/:patient_id - Recent turns, oldest first
pub async fn get_history(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ConversationTurn>>> {
    let limit = params.limit.unwrap_or(state.config().server.history_turns);
    let turns = state.conversations().recent(&patient_id, limit).await?;
    Ok(Json(turns))
}

/// DELETE /api/conversations/:patient_id
pub async fn clear_history(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<StatusCode> {
    state.conversations().clear(&patient_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
