//! LLM provider trait for text completion

use async_trait::async_trait;

use crate::error::Result;

/// Trait for prompt completion backends
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (mistral, llama3, ...)
///
/// Timeouts, retries and concurrency limits are applied by
/// `GenerationClient`, not by implementations.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a fully composed prompt
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model in use
    fn model(&self) -> &str;
}
