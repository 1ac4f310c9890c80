//! Turning completions into attributed conversation turns

use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::types::{Citation, ConversationTurn, Grounding, RetrievedPassage};

use super::prompt::rank_passages;

/// Fraction of the answer's content terms a passage must contain to count
/// as support when the model did not cite it explicitly
const DEFAULT_MIN_OVERLAP: f32 = 0.2;

const SNIPPET_CHARS: usize = 160;

/// Phrases meaning the model found nothing usable in the passages
const REFUSAL_MARKERS: [&str; 3] = [
    "cannot find this information",
    "not in the provided guidelines",
    "not available in the provided",
];

const STOPWORDS: [&str; 18] = [
    "this", "that", "with", "from", "have", "your", "will", "should", "about", "which", "there",
    "their", "they", "been", "into", "when", "what", "also",
];

/// `[2]` or `[Source: who-anc-2016]`
fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[(?:(\d+)|Source:\s*([^\]]+))\]").expect("Invalid regex")
    })
}

/// Attaches supporting passages to a completion
pub struct AnswerAssembler {
    min_overlap: f32,
}

impl Default for AnswerAssembler {
    fn default() -> Self {
        Self {
            min_overlap: DEFAULT_MIN_OVERLAP,
        }
    }
}

impl AnswerAssembler {
    pub fn new(min_overlap: f32) -> Self {
        Self { min_overlap }
    }

    pub fn assemble(
        &self,
        question: &str,
        completion: &str,
        passages: &[RetrievedPassage],
    ) -> ConversationTurn {
        self.assemble_at(question, completion, passages, Utc::now())
    }

    /// Build the turn. Without passages, or when the model says the passages
    /// do not answer the question, the turn is ungrounded.
    pub fn assemble_at(
        &self,
        question: &str,
        completion: &str,
        passages: &[RetrievedPassage],
        timestamp: DateTime<Utc>,
    ) -> ConversationTurn {
        let answer_text = completion.trim().to_string();

        let grounding = if passages.is_empty() || is_refusal(&answer_text) {
            Grounding::Ungrounded
        } else {
            Grounding::Grounded {
                citations: self.supporting_citations(&answer_text, passages),
            }
        };

        ConversationTurn {
            question: question.trim().to_string(),
            answer_text,
            grounding,
            timestamp,
        }
    }

    /// Passages cited explicitly or sharing enough vocabulary with the
    /// answer, best first, one per document. Falls back to the top passage.
    fn supporting_citations(&self, answer: &str, passages: &[RetrievedPassage]) -> Vec<Citation> {
        let ranked = rank_passages(passages);
        let (cited_indices, cited_sources) = explicit_markers(answer);
        let answer_terms = content_terms(answer);

        let mut supporting: Vec<&RetrievedPassage> = ranked
            .iter()
            .enumerate()
            .filter(|(i, p)| {
                cited_indices.contains(&(i + 1))
                    || cited_sources.contains(&p.source_document_id.to_lowercase())
                    || overlap(&answer_terms, &p.text) >= self.min_overlap
            })
            .map(|(_, p)| *p)
            .collect();

        if supporting.is_empty() {
            supporting.extend(ranked.first().copied());
        }

        let mut seen = HashSet::new();
        supporting
            .into_iter()
            .filter(|p| seen.insert(p.source_document_id.as_str()))
            .map(|p| Citation {
                source_document_id: p.source_document_id.clone(),
                chunk_id: p.chunk_id,
                page_number: p.page_number,
                similarity_score: p.similarity_score,
                snippet: truncate_snippet(p.text.trim(), SNIPPET_CHARS),
            })
            .collect()
    }
}

fn is_refusal(answer: &str) -> bool {
    let lower = answer.to_lowercase();
    REFUSAL_MARKERS.iter().any(|m| lower.contains(m))
}

fn explicit_markers(answer: &str) -> (HashSet<usize>, HashSet<String>) {
    let mut indices = HashSet::new();
    let mut sources = HashSet::new();
    for cap in marker_pattern().captures_iter(answer) {
        if let Some(n) = cap.get(1).and_then(|m| m.as_str().parse().ok()) {
            indices.insert(n);
        }
        if let Some(source) = cap.get(2) {
            sources.insert(source.as_str().trim().to_lowercase());
        }
    }
    (indices, sources)
}

/// Lowercased words of four or more letters, minus common filler
fn content_terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Share of `answer_terms` found in `passage`
fn overlap(answer_terms: &HashSet<String>, passage: &str) -> f32 {
    if answer_terms.is_empty() {
        return 0.0;
    }
    let passage_terms = content_terms(passage);
    let shared = answer_terms.intersection(&passage_terms).count();
    shared as f32 / answer_terms.len() as f32
}

/// Truncate snippet to a maximum length while preserving word boundaries
pub fn truncate_snippet(snippet: &str, max_len: usize) -> String {
    if snippet.len() <= max_len {
        return snippet.to_string();
    }

    let mut end = max_len;
    while end > 0 && !snippet.is_char_boundary(end) {
        end -= 1;
    }

    if let Some(pos) = snippet[..end].rfind(' ') {
        return format!("{}...", &snippet[..pos]);
    }

    format!("{}...", &snippet[..end])
}
