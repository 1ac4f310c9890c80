//! Application state for the assistant server

use dashmap::DashMap;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::assistant::Assistant;
use crate::config::AssistConfig;
use crate::error::Result;
use crate::providers::{ConversationStore, InMemoryConversationStore};
use crate::types::{PatientContext, SeverityTier};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    assistant: Assistant,
    /// Prior turns per patient
    conversations: Arc<dyn ConversationStore>,
    /// Most recent overall severity per patient, fed into chat prompts
    latest_risk: DashMap<String, SeverityTier>,
    ready: RwLock<bool>,
}

impl AppState {
    /// Build the assistant from configuration with an in-memory history store
    pub fn new(config: AssistConfig) -> Result<Self> {
        let assistant = Assistant::from_config(config)?;
        Ok(Self::with_parts(
            assistant,
            Arc::new(InMemoryConversationStore::new()),
        ))
    }

    /// Wrap an existing assistant and conversation store
    pub fn with_parts(assistant: Assistant, conversations: Arc<dyn ConversationStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                assistant,
                conversations,
                latest_risk: DashMap::new(),
                ready: RwLock::new(true),
            }),
        }
    }

    pub fn assistant(&self) -> &Assistant {
        &self.inner.assistant
    }

    pub fn config(&self) -> &AssistConfig {
        self.inner.assistant.config()
    }

    pub fn conversations(&self) -> &Arc<dyn ConversationStore> {
        &self.inner.conversations
    }

    /// Remember a patient's latest assessed severity
    pub fn record_risk(&self, patient_id: &str, tier: SeverityTier) {
        self.inner.latest_risk.insert(patient_id.to_string(), tier);
    }

    /// Context for a chat request: the caller's gestational week plus the
    /// last recorded risk level, if any
    pub fn patient_context(&self, patient_id: &str, gestational_week: Option<u32>) -> PatientContext {
        PatientContext {
            gestational_week,
            latest_risk: self.inner.latest_risk.get(patient_id).map(|t| *t),
        }
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }

    /// Index the guideline directory on a background task. Readiness is
    /// cleared until the run ends, whether or not every file succeeded.
    pub fn spawn_guideline_ingest(&self, dir: PathBuf) -> JoinHandle<()> {
        self.set_ready(false);
        let state = self.clone();
        tokio::spawn(async move {
            match state.assistant().ingest_directory(&dir).await {
                Ok(report) => {
                    tracing::info!(
                        documents = report.ingested.len(),
                        chunks = report.total_chunks(),
                        failed = report.failed.len(),
                        "Guidelines ingested from {}",
                        dir.display()
                    );
                    for (path, error) in &report.failed {
                        tracing::warn!("  - {}: {}", path.display(), error);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Guideline ingestion failed"),
            }
            state.set_ready(true);
        })
    }
}
