//! Conversation history storage

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::types::ConversationTurn;

/// Persists conversation turns per patient. The assistant core never
/// writes here itself; the HTTP layer appends the turns it returns.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append a turn to a patient's history
    async fn append(&self, patient_id: &str, turn: ConversationTurn) -> Result<()>;

    /// Most recent `limit` turns, oldest first
    async fn recent(&self, patient_id: &str, limit: usize) -> Result<Vec<ConversationTurn>>;

    /// Drop a patient's history
    async fn clear(&self, patient_id: &str) -> Result<()>;
}

/// Process-local store
#[derive(Default)]
pub struct InMemoryConversationStore {
    turns: DashMap<String, Vec<ConversationTurn>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, patient_id: &str, turn: ConversationTurn) -> Result<()> {
        self.turns
            .entry(patient_id.to_string())
            .or_default()
            .push(turn);
        Ok(())
    }

    async fn recent(&self, patient_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        Ok(self
            .turns
            .get(patient_id)
            .map(|turns| {
                let skip = turns.len().saturating_sub(limit);
                turns[skip..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn clear(&self, patient_id: &str) -> Result<()> {
        self.turns.remove(patient_id);
        Ok(())
    }
}
