//! The assistant facade: `ask`, `assess` and `ingest` over shared components

use std::path::Path;
use std::sync::Arc;

use crate::config::{AssistConfig, EmbeddingBackend};
use crate::error::{Error, Result};
use crate::generation::{AnswerAssembler, GenerationClient, PromptComposer};
use crate::ingestion::{IngestPipeline, IngestReport, TextChunker};
use crate::providers::{ollama_providers, EmbeddingProvider, HashingEmbedder, LlmProvider};
use crate::retrieval::{IndexStats, Retriever, VectorIndex};
use crate::risk::{RiskEngine, RiskRuleSet};
use crate::types::{
    ConversationTurn, DocumentSource, PatientContext, RiskAssessmentResult, VitalsSnapshot,
};

/// Pregnancy-guideline assistant.
///
/// Holds no per-patient state. Conversation history is passed in by the
/// caller and the returned turn is the caller's to persist.
pub struct Assistant {
    config: AssistConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    retriever: Retriever,
    generator: GenerationClient,
    assembler: AnswerAssembler,
    risk: RiskEngine,
    pipeline: IngestPipeline,
}

impl Assistant {
    /// Assemble an assistant from explicit providers
    pub fn new(
        config: AssistConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        rules: RiskRuleSet,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dimensions() != config.embeddings.dimensions {
            return Err(Error::configuration(format!(
                "embedder '{}' produces {} dimensions, config expects {}",
                embedder.name(),
                embedder.dimensions(),
                config.embeddings.dimensions
            )));
        }

        let index = Arc::new(VectorIndex::new(config.embeddings.dimensions));
        let retriever = Retriever::new(Arc::clone(&embedder), Arc::clone(&index), &config.retrieval);
        let pipeline = IngestPipeline::new(
            TextChunker::from_config(&config.chunking)?,
            Arc::clone(&embedder),
            Arc::clone(&index),
        );
        let generator = GenerationClient::new(llm, &config.generation);
        let risk = RiskEngine::new(Arc::new(rules));

        Ok(Self {
            config,
            embedder,
            index,
            retriever,
            generator,
            assembler: AnswerAssembler::default(),
            risk,
            pipeline,
        })
    }

    /// Build the configured providers and rule table
    pub fn from_config(config: AssistConfig) -> Result<Self> {
        let dims = config.embeddings.dimensions;
        let (ollama_embedder, llm) =
            ollama_providers(&config.llm, dims, config.embeddings.batch_concurrency)?;

        let embedder: Arc<dyn EmbeddingProvider> = match config.embeddings.provider {
            EmbeddingBackend::Ollama => Arc::new(ollama_embedder),
            EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(dims)),
        };

        let rules = match &config.risk.rules_path {
            Some(path) => RiskRuleSet::from_file(path)?,
            None => RiskRuleSet::builtin()?,
        };

        tracing::info!(
            embedder = embedder.name(),
            llm_model = %config.llm.generate_model,
            rule_version = rules.version(),
            "Assistant initialized"
        );

        Self::new(config, embedder, Arc::new(llm), rules)
    }

    /// Answer a question without patient context
    pub async fn ask(
        &self,
        patient_id: &str,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<ConversationTurn> {
        self.ask_with_context(patient_id, question, history, &PatientContext::default())
            .await
    }

    /// Answer a question grounded in the indexed guidelines.
    ///
    /// `history` is oldest first. With no relevant passages the answer is
    /// still generated, but the turn is marked ungrounded. Dropping the
    /// returned future cancels retrieval and generation.
    pub async fn ask_with_context(
        &self,
        patient_id: &str,
        question: &str,
        history: &[ConversationTurn],
        context: &PatientContext,
    ) -> Result<ConversationTurn> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::validation("question must not be empty"));
        }

        let passages = self.retriever.retrieve(question).await?;
        if passages.is_empty() {
            tracing::info!(patient_id, "No relevant guideline passages, answering ungrounded");
        }

        let composed = PromptComposer::compose_for_patient(
            question,
            &passages,
            history,
            context,
            self.config.generation.max_prompt_tokens,
        );

        let completion = self
            .generator
            .generate(&composed.text, self.config.generation.timeout())
            .await?;
        if completion.trim().is_empty() {
            return Err(Error::generation("backend returned an empty completion"));
        }

        // Only passages the model actually saw can be cited
        let turn = self.assembler.assemble(question, &completion, &composed.included);
        tracing::info!(
            patient_id,
            passages = passages.len(),
            in_prompt = composed.included.len(),
            citations = turn.citations().len(),
            grounded = turn.is_grounded(),
            "Answered question"
        );
        Ok(turn)
    }

    /// Grade a vitals snapshot against the rule table
    pub fn assess(&self, patient_id: &str, snapshot: &VitalsSnapshot) -> Result<RiskAssessmentResult> {
        if snapshot.patient_id != patient_id {
            return Err(Error::validation(format!(
                "snapshot belongs to patient '{}', not '{}'",
                snapshot.patient_id, patient_id
            )));
        }
        snapshot.validate()?;
        Ok(self.risk.evaluate(snapshot))
    }

    /// Index one guideline document, returning its chunk count
    pub async fn ingest(&self, source: &DocumentSource) -> Result<usize> {
        self.pipeline.ingest(source).await
    }

    /// Index every supported document under `dir`
    pub async fn ingest_directory(&self, dir: impl AsRef<Path>) -> Result<IngestReport> {
        self.pipeline.ingest_directory(dir.as_ref()).await
    }

    /// Drop a document's chunks from the index, returning how many went
    pub fn remove_document(&self, document_id: &str) -> Result<usize> {
        if !self.index.contains_document(document_id) {
            return Err(Error::DocumentNotFound(document_id.to_string()));
        }
        let removed = self.index.remove_document(document_id);
        tracing::info!(document_id, removed, "Removed document");
        Ok(removed)
    }

    pub fn index_stats(&self) -> IndexStats {
        self.index.stats()
    }

    pub fn config(&self) -> &AssistConfig {
        &self.config
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    pub fn generator(&self) -> &GenerationClient {
        &self.generator
    }

    pub fn risk_engine(&self) -> &RiskEngine {
        &self.risk
    }
}
