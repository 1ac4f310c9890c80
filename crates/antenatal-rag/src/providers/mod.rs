//! Provider abstractions for embeddings, completion and conversation storage
//!
//! Trait-based so the Ollama backends can be swapped for the local hashing
//! embedder or for scripted fakes in tests.

pub mod conversation_store;
pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod ollama;

pub use conversation_store::{ConversationStore, InMemoryConversationStore};
pub use embedding::EmbeddingProvider;
pub use hashing::HashingEmbedder;
pub use llm::LlmProvider;
pub use ollama::{ollama_providers, OllamaClient, OllamaEmbedder, OllamaLlm};
