//! Question-to-passage retrieval

use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::providers::EmbeddingProvider;
use crate::types::RetrievedPassage;

use super::index::VectorIndex;

/// Embeds a question and pulls the closest guideline passages
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    top_k: usize,
    min_similarity: f32,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k: config.top_k,
            min_similarity: config.min_similarity,
        }
    }

    /// Retrieve with the configured `top_k` and relevance floor
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedPassage>> {
        self.retrieve_with(question, self.top_k, self.min_similarity)
            .await
    }

    /// Up to `k` passages at or above `min_similarity`, most similar first.
    /// An empty index yields no passages and no embedding call.
    pub async fn retrieve_with(
        &self,
        question: &str,
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<RetrievedPassage>> {
        if self.index.is_empty() {
            tracing::debug!("Index is empty, skipping retrieval");
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(question).await?;
        let scored = self.index.query(&query_vector, k)?;
        let candidates = scored.len();

        let passages: Vec<RetrievedPassage> = scored
            .into_iter()
            .filter(|s| s.similarity >= min_similarity)
            .map(|s| RetrievedPassage::from_chunk(&s.chunk, s.similarity))
            .collect();

        tracing::debug!(
            candidates,
            kept = passages.len(),
            floor = min_similarity,
            "Retrieved passages"
        );
        Ok(passages)
    }
}
