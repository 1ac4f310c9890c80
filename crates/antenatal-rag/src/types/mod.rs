//! Core types for the assistant

pub mod conversation;
pub mod document;
pub mod risk;
pub mod vitals;

pub use conversation::{Citation, ConversationTurn, Grounding, PatientContext};
pub use document::{DocumentChunk, DocumentSource, FileType, RetrievedPassage, SourceContent};
pub use risk::{RiskAssessmentResult, RiskFactorResult, SeverityTier};
pub use vitals::VitalsSnapshot;
