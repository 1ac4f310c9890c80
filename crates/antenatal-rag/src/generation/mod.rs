//! Answer generation: prompt budgeting, bounded LLM calls and citations

pub mod citation;
pub mod client;
pub mod prompt;

pub use citation::AnswerAssembler;
pub use client::GenerationClient;
pub use prompt::{estimate_tokens, ComposedPrompt, PromptComposer, REFUSAL_PHRASE};
