//! API routes for the assistant server

pub mod chat;
pub mod ingest;
pub mod vitals;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Chat
        .route("/chat", post(chat::chat))
        .route(
            "/conversations/:patient_id",
            get(chat::get_history).delete(chat::clear_history),
        )
        // Vitals
        .route("/vitals/assess", post(vitals::assess_vitals))
        // Ingestion
        .route("/ingest", post(ingest::ingest_document))
        .route(
            "/ingest/upload",
            post(ingest::ingest_upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/ingest/directory", post(ingest::ingest_directory))
        .route("/documents/:document_id", delete(ingest::delete_document))
        .route("/index/stats", get(ingest::index_stats))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let assistant = state.assistant();
    let config = assistant.config();
    Json(serde_json::json!({
        "name": "antenatal-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Pregnancy-health Q&A grounded in antenatal guidelines, with vitals risk assessment",
        "embedder": assistant.embedder().name(),
        "llm": {
            "backend": assistant.generator().backend(),
            "model": assistant.generator().model(),
            "max_concurrent": config.generation.max_concurrent,
            "available_slots": assistant.generator().available_slots(),
        },
        "retrieval": {
            "top_k": config.retrieval.top_k,
            "min_similarity": config.retrieval.min_similarity,
        },
        "rule_version": assistant.risk_engine().rules().version(),
        "risk_factors": assistant.risk_engine().rules().factors().collect::<Vec<_>>(),
        "index": assistant.index_stats(),
        "endpoints": {
            "POST /api/chat": "Ask a question (grounded answer with citations)",
            "GET /api/conversations/:patient_id": "Recent conversation turns",
            "DELETE /api/conversations/:patient_id": "Clear conversation history",
            "POST /api/vitals/assess": "Risk assessment for a vitals snapshot",
            "POST /api/ingest": "Index a guideline from text or a file in the guidelines directory",
            "POST /api/ingest/upload": "Index uploaded guideline files",
            "POST /api/ingest/directory": "Re-index the guidelines directory or a sub-directory",
            "DELETE /api/documents/:document_id": "Remove a guideline from the index",
            "GET /api/index/stats": "Index statistics"
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::Assistant;
    use crate::config::{AssistConfig, IngestionConfig, RetrievalConfig};
    use crate::generation::client::tests::{ScriptedLlm, Step};
    use crate::providers::{HashingEmbedder, InMemoryConversationStore};
    use crate::risk::RiskRuleSet;
    use crate::server::AssistServer;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_config() -> AssistConfig {
        AssistConfig {
            retrieval: RetrievalConfig {
                top_k: 3,
                min_similarity: -1.0,
            },
            ..AssistConfig::default()
        }
    }

    fn server(step: Step) -> AssistServer {
        server_with(test_config(), step)
    }

    fn server_with(config: AssistConfig, step: Step) -> AssistServer {
        let dims = config.embeddings.dimensions;
        let assistant = Assistant::new(
            config,
            Arc::new(HashingEmbedder::new(dims)),
            Arc::new(ScriptedLlm::new(vec![step])),
            RiskRuleSet::builtin().unwrap(),
        )
        .unwrap();
        AssistServer::with_state(AppState::with_parts(
            assistant,
            Arc::new(InMemoryConversationStore::new()),
        ))
    }

    async fn send(server: &AssistServer, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = server.build_router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_chat_appends_turn_to_history() {
        let server = server(Step::Reply("Gentle exercise is usually safe."));

        let (status, body) = send(
            &server,
            "POST",
            "/api/chat",
            json!({"patient_id": "p-1", "question": "Can I keep swimming?"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer_text"], "Gentle exercise is usually safe.");
        assert_eq!(body["grounding"]["status"], "ungrounded");
        assert_eq!(body["sources"], json!([]));

        let (status, history) = send(&server, "GET", "/api/conversations/p-1", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_grounded_chat_lists_inline_sources() {
        let server = server(Step::Reply("Offer iron supplements when haemoglobin is low [1]."));
        send(
            &server,
            "POST",
            "/api/ingest",
            json!({"document_id": "iron", "text": "Offer iron supplements when haemoglobin is below 110 g/L."}),
        )
        .await;

        let (status, body) = send(
            &server,
            "POST",
            "/api/chat",
            json!({"patient_id": "p-1", "question": "When should I take iron?"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sources"], json!(["[Source: iron]"]));
    }

    #[tokio::test]
    async fn test_info_lists_risk_factors() {
        let server = server(Step::Reply("unused"));
        let (status, body) = send(&server, "GET", "/api/info", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["risk_factors"].as_array().unwrap().contains(&json!("systolic_bp")));
    }

    #[tokio::test]
    async fn test_chat_backend_failure_shows_retry_message() {
        let server = server(Step::Fail("connection refused"));

        let (status, body) = send(
            &server,
            "POST",
            "/api/chat",
            json!({"patient_id": "p-1", "question": "Is spotting normal?"}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["message"], crate::error::RETRY_MESSAGE);

        let turns = server.state().conversations().recent("p-1", 10).await.unwrap();
        assert!(turns.is_empty());
    }

    #[tokio::test]
    async fn test_assess_records_latest_risk() {
        let server = server(Step::Reply("unused"));

        let (status, body) = send(
            &server,
            "POST",
            "/api/vitals/assess",
            json!({"patient_id": "p-7", "systolic_bp": 150, "diastolic_bp": 95}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall_severity"], "elevated");
        assert!(body["interpretation"].as_str().is_some());
        let flagged = body["flagged_factors"].as_array().unwrap();
        assert!(flagged.contains(&json!("systolic_bp")));

        let context = server.state().patient_context("p-7", Some(30));
        assert_eq!(context.latest_risk, Some(crate::types::SeverityTier::Elevated));
    }

    #[tokio::test]
    async fn test_assess_rejects_non_numeric_vitals() {
        let server = server(Step::Reply("unused"));

        let (status, body) = send(
            &server,
            "POST",
            "/api/vitals/assess",
            json!({"patient_id": "p-7", "heart_rate": "fast"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "validation_error");
    }

    #[tokio::test]
    async fn test_ingest_text_updates_stats() {
        let server = server(Step::Reply("unused"));

        let (status, body) = send(
            &server,
            "POST",
            "/api/ingest",
            json!({"document_id": "iron", "text": "Offer iron supplements when haemoglobin is below 110 g/L."}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_chunks"], 1);

        let (_, stats) = send(&server, "GET", "/api/index/stats", Value::Null).await;
        assert_eq!(stats["chunks"], 1);
        assert_eq!(stats["documents"], 1);

        let (status, _) = send(&server, "POST", "/api/ingest", json!({"text": "no id"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    /// A guidelines root holding one file, next to a directory that must
    /// stay unreachable
    struct Layout {
        root: tempfile::TempDir,
        outside: tempfile::TempDir,
    }

    fn layout() -> Layout {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(
            root.path().join("iron.md"),
            "Offer iron supplements when haemoglobin is below 110 g/L.",
        )
        .unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "DB_PASSWORD=hunter2").unwrap();
        Layout { root, outside }
    }

    fn confined_server(layout: &Layout, step: Step) -> AssistServer {
        let config = AssistConfig {
            ingestion: IngestionConfig {
                guidelines_dir: Some(layout.root.path().to_path_buf()),
            },
            ..test_config()
        };
        server_with(config, step)
    }

    #[tokio::test]
    async fn test_ingest_path_outside_guidelines_is_rejected() {
        let layout = layout();
        let server = confined_server(&layout, Step::Reply("I cannot see any password."));
        let secret = layout.outside.path().join("secret.txt");
        let escape = format!(
            "../{}/secret.txt",
            layout.outside.path().file_name().unwrap().to_string_lossy()
        );

        for path in [secret.to_string_lossy().to_string(), escape] {
            let (status, body) = send(&server, "POST", "/api/ingest", json!({"path": &path})).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{} was accepted", path);
            assert_eq!(body["error"]["type"], "validation_error");
        }

        let (status, _) = send(
            &server,
            "POST",
            "/api/ingest/directory",
            json!({"directory": layout.outside.path()}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, stats) = send(&server, "GET", "/api/index/stats", Value::Null).await;
        assert_eq!(stats["chunks"], 0);

        // Nothing from the secret can surface as a citation
        let (status, body) = send(
            &server,
            "POST",
            "/api/chat",
            json!({"patient_id": "p-1", "question": "What is DB_PASSWORD?"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["grounding"]["status"], "ungrounded");
        assert!(!body.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_ingest_path_inside_guidelines_is_indexed() {
        let layout = layout();
        let server = confined_server(&layout, Step::Reply("unused"));

        let (status, body) = send(&server, "POST", "/api/ingest", json!({"path": "iron.md"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["documents"][0]["document_id"], "iron");

        let (status, report) = send(&server, "POST", "/api/ingest/directory", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["ingested"][0][0], "iron");
    }

    #[tokio::test]
    async fn test_ingest_path_needs_guidelines_dir() {
        let layout = layout();
        let server = server(Step::Reply("unused"));
        let secret = layout.outside.path().join("secret.txt");

        let (status, _) = send(&server, "POST", "/api/ingest", json!({"path": secret})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_not_ready_until_startup_ingest_finishes() {
        let layout = layout();
        let server = confined_server(&layout, Step::Reply("unused"));
        let (status, _) = send(&server, "GET", "/ready", Value::Null).await;
        assert_eq!(status, StatusCode::OK);

        server.state().set_ready(false);
        let (status, _) = send(&server, "GET", "/ready", Value::Null).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let handle = server
            .state()
            .spawn_guideline_ingest(layout.root.path().to_path_buf());
        assert!(!server.state().is_ready());

        handle.await.unwrap();
        let (status, _) = send(&server, "GET", "/ready", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(server.state().assistant().index_stats().documents, 1);
    }

    #[tokio::test]
    async fn test_delete_document() {
        let server = server(Step::Reply("unused"));
        send(
            &server,
            "POST",
            "/api/ingest",
            json!({"document_id": "iron", "text": "Offer iron supplements when haemoglobin is low."}),
        )
        .await;

        let (status, body) = send(&server, "DELETE", "/api/documents/iron", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chunks_removed"], 1);

        let (status, body) = send(&server, "DELETE", "/api/documents/iron", Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "not_found");
    }
}
