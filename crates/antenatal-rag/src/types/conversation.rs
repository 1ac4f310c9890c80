//! Conversation turns and their grounding

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::risk::SeverityTier;

/// A guideline passage cited in support of an answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// Source document identifier
    pub source_document_id: String,
    /// The supporting chunk
    pub chunk_id: Uuid,
    /// Page of the supporting chunk, when the source is paginated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Retrieval similarity of the supporting chunk
    pub similarity_score: f32,
    /// Short excerpt of the supporting chunk
    pub snippet: String,
}

impl Citation {
    /// Format citation for display in text
    pub fn format_inline(&self) -> String {
        match self.page_number {
            Some(page) => format!("[Source: {}, Page {}]", self.source_document_id, page),
            None => format!("[Source: {}]", self.source_document_id),
        }
    }
}

/// Whether an answer is backed by guideline passages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Grounding {
    /// At least one citation, ordered by descending similarity, one per document
    Grounded { citations: Vec<Citation> },
    /// Answered from general knowledge; no supporting passage
    Ungrounded,
}

/// One question/answer exchange, produced by the core and persisted by the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer_text: String,
    pub grounding: Grounding,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Citations attached to this turn (empty when ungrounded)
    pub fn citations(&self) -> &[Citation] {
        match &self.grounding {
            Grounding::Grounded { citations } => citations,
            Grounding::Ungrounded => &[],
        }
    }

    /// Cited source document identifiers in citation order
    pub fn cited_documents(&self) -> Vec<&str> {
        self.citations()
            .iter()
            .map(|c| c.source_document_id.as_str())
            .collect()
    }

    pub fn is_grounded(&self) -> bool {
        matches!(self.grounding, Grounding::Grounded { .. })
    }
}

/// Patient facts worth telling the model alongside a question
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientContext {
    /// Current gestational week
    pub gestational_week: Option<u32>,
    /// Overall severity of the most recent risk assessment
    pub latest_risk: Option<SeverityTier>,
}

impl PatientContext {
    pub fn is_empty(&self) -> bool {
        self.gestational_week.is_none() && self.latest_risk.is_none()
    }

    /// One-line rendering used in prompts
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(week) = self.gestational_week {
            parts.push(format!("gestational week {}", week));
        }
        if let Some(risk) = self.latest_risk {
            parts.push(format!("latest vitals risk level: {}", risk));
        }
        parts.join("; ")
    }
}
