//! Configuration for the antenatal assistant

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming a TOML configuration file
pub const CONFIG_ENV_VAR: &str = "ANTENATAL_RAG_CONFIG";

/// Main assistant configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Generation limits
    pub generation: GenerationConfig,
    /// Risk engine configuration
    pub risk: RiskConfig,
    /// Guideline ingestion
    pub ingestion: IngestionConfig,
}

impl AssistConfig {
    /// Parse a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| {
            Error::configuration(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `ANTENATAL_RAG_CONFIG`, falling back to defaults
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(PathBuf::from(path)),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Reject configurations the system cannot serve with
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.embeddings.dimensions == 0 {
            return Err(Error::configuration("embeddings.dimensions must be positive"));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::configuration("retrieval.top_k must be at least 1"));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(Error::configuration(
                "retrieval.min_similarity must lie in [-1, 1]",
            ));
        }
        if self.generation.max_concurrent == 0 {
            return Err(Error::configuration(
                "generation.max_concurrent must be at least 1",
            ));
        }
        if self.generation.max_prompt_tokens == 0 {
            return Err(Error::configuration(
                "generation.max_prompt_tokens must be positive",
            ));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Prior turns loaded from the conversation store per chat request
    pub history_turns: usize,
    /// Max upload size in bytes
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            history_turns: 6,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama `/api/embeddings`
    #[default]
    Ollama,
    /// Local feature-hashing embedder, no network
    Hashing,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend provider
    pub provider: EmbeddingBackend,
    /// Embedding dimensions (384 for MiniLM)
    pub dimensions: usize,
    /// Concurrent requests when embedding a batch
    pub batch_concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Ollama,
            dimensions: 384,
            batch_concurrency: 4,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

impl ChunkingConfig {
    /// `chunk_size` and `chunk_overlap` must be positive with overlap < size
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_overlap == 0 {
            return Err(Error::configuration(
                "chunk_size and chunk_overlap must be positive",
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Timeout for a single embedding request in seconds
    pub embed_timeout_secs: u64,
    /// Number of retries for failed embedding requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "all-minilm".to_string(),
            generate_model: "mistral".to_string(),
            temperature: 0.3,
            embed_timeout_secs: 30,
            max_retries: 2,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of candidate chunks to fetch
    pub top_k: usize,
    /// Relevance floor (cosine similarity)
    pub min_similarity: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_similarity: 0.30,
        }
    }
}

/// Generation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Timeout for one generation attempt in seconds
    pub timeout_secs: u64,
    /// Ceiling on in-flight generation calls
    pub max_concurrent: usize,
    /// How long a request may wait for a generation slot, in seconds
    pub queue_timeout_secs: u64,
    /// Prompt budget in (estimated) tokens
    pub max_prompt_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            max_concurrent: 4,
            queue_timeout_secs: 30,
            max_prompt_tokens: 3072,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    pub fn queue_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.queue_timeout_secs)
    }
}

/// Risk engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// TOML threshold table; the built-in table is used when unset
    pub rules_path: Option<PathBuf>,
}

/// Guideline ingestion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Directory of guideline documents ingested at server start
    pub guidelines_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AssistConfig::default().validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let chunking = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
        };
        assert!(matches!(chunking.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AssistConfig = toml::from_str(
            r#"
            [retrieval]
            top_k = 5

            [embeddings]
            provider = "hashing"
            "#,
        )
        .unwrap();

        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.min_similarity, 0.30);
        assert_eq!(config.embeddings.provider, EmbeddingBackend::Hashing);
        assert_eq!(config.chunking.chunk_size, 500);
    }

    #[test]
    fn test_mistyped_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assist.toml");
        std::fs::write(&path, "[retrieval]\ntop_k = \"three\"\n").unwrap();

        let err = AssistConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("assist.toml"));
    }

    #[test]
    fn test_rejects_zero_generation_ceiling() {
        let mut config = AssistConfig::default();
        config.generation.max_concurrent = 0;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }
}
