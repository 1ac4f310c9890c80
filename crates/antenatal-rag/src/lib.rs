//! antenatal-rag: pregnancy-health Q&A grounded in antenatal guidelines
//!
//! Guideline documents are chunked, embedded and held in an in-memory vector
//! index. Questions are answered by an LLM over the most relevant passages,
//! with citations back to the source documents. A separate threshold engine
//! grades maternal vitals into severity tiers with recommendations.

pub mod assistant;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod risk;
pub mod server;
pub mod types;

pub use assistant::Assistant;
pub use config::AssistConfig;
pub use error::{Error, Result};
pub use types::{
    Citation, ConversationTurn, DocumentSource, Grounding, PatientContext,
    RiskAssessmentResult, SeverityTier, VitalsSnapshot,
};
