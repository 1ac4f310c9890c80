//! Bounded, timeout-aware access to the completion backend

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::providers::LlmProvider;

/// Wraps an `LlmProvider` with a concurrency ceiling, a per-attempt timeout
/// and a single retry on timeout.
///
/// Callers beyond the ceiling queue in FIFO order (tokio's semaphore is
/// fair) for at most `queue_timeout`. Backend errors are returned as-is and
/// never retried. Dropping the returned future cancels the in-flight call
/// and releases the slot.
pub struct GenerationClient {
    llm: Arc<dyn LlmProvider>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    queue_timeout: Duration,
}

impl GenerationClient {
    pub fn new(llm: Arc<dyn LlmProvider>, config: &GenerationConfig) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            llm,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            queue_timeout: config.queue_timeout(),
        }
    }

    /// Complete `prompt`. A first attempt that exceeds `timeout` is retried
    /// once with the same prompt; a second timeout yields
    /// `GenerationUnavailable`.
    pub async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String> {
        let _permit = tokio::time::timeout(self.queue_timeout, self.permits.acquire())
            .await
            .map_err(|_| {
                tracing::warn!(
                    waited = ?self.queue_timeout,
                    ceiling = self.max_concurrent,
                    "No generation slot became free"
                );
                Error::GenerationUnavailable("generation queue is full".to_string())
            })?
            .map_err(|_| Error::GenerationUnavailable("generation client closed".to_string()))?;

        match self.attempt(prompt, timeout).await {
            Err(Error::GenerationTimeout(elapsed)) => {
                tracing::warn!(?elapsed, backend = self.llm.name(), "Generation timed out, retrying once");
                match self.attempt(prompt, timeout).await {
                    Err(Error::GenerationTimeout(_)) => Err(Error::GenerationUnavailable(format!(
                        "{} timed out twice after {:?}",
                        self.llm.name(),
                        timeout
                    ))),
                    other => other,
                }
            }
            other => other,
        }
    }

    /// One bounded call to the backend
    async fn attempt(&self, prompt: &str, timeout: Duration) -> Result<String> {
        match tokio::time::timeout(timeout, self.llm.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(Error::GenerationTimeout(timeout)),
        }
    }

    /// Free generation slots right now
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.llm.health_check().await
    }

    pub fn backend(&self) -> &str {
        self.llm.name()
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }
}
