//! Boundary-aware text chunking with overlap

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::Result;

/// Break quality at a character position
const NO_BREAK: u8 = 0;
const WORD_BREAK: u8 = 1;
const SENTENCE_BREAK: u8 = 2;
const PARAGRAPH_BREAK: u8 = 3;

/// A contiguous span of the source text. `start`/`end` are byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Text chunker with configurable size and overlap (both in characters)
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker. Fails unless `0 < overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        Self::from_config(&ChunkingConfig {
            chunk_size,
            chunk_overlap: overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        })
    }

    /// Split `text` into ordered, overlapping spans covering every character.
    ///
    /// Each span holds at most `chunk_size` characters. A span ends at the best
    /// boundary in the back half of its window (paragraph, then sentence, then
    /// word) and is cut mid-word only when the window has no boundary at all.
    /// The next span starts about `overlap` characters before the previous end,
    /// snapped forward to a word start.
    pub fn chunk(&self, text: &str) -> Vec<TextSpan> {
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = offsets.len() - 1;
        if char_count == 0 {
            return Vec::new();
        }

        let scores = boundary_scores(text, &offsets);
        let span = |start: usize, end: usize| TextSpan {
            start: offsets[start],
            end: offsets[end],
            text: text[offsets[start]..offsets[end]].to_string(),
        };

        let mut spans = Vec::new();
        let mut start = 0usize;
        let mut prev_end = 0usize;

        loop {
            if char_count - start <= self.chunk_size {
                spans.push(span(start, char_count));
                break;
            }

            let hard_end = start + self.chunk_size;
            // Every span must reach past the previous one, or the
            // non-overlapping parts would not add up to the whole text.
            let floor = (start + (self.chunk_size / 2).max(1)).max(prev_end + 1);
            let end = best_break(&scores, floor, hard_end);

            spans.push(span(start, end));
            prev_end = end;
            start = self.next_start(&scores, start, end);
        }

        spans
    }

    /// Start of the span following `[start, end)`
    fn next_start(&self, scores: &[u8], start: usize, end: usize) -> usize {
        let candidate = end.saturating_sub(self.overlap).max(start + 1);
        (candidate..end)
            .find(|&p| scores[p] >= WORD_BREAK)
            .unwrap_or(candidate)
    }
}

/// Chunk `text` with the given parameters
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<TextSpan>> {
    Ok(TextChunker::new(chunk_size, overlap)?.chunk(text))
}

/// Highest-scoring break in `floor..=hard_end`, preferring the later position
/// on ties. Falls back to `hard_end` when no boundary exists.
fn best_break(scores: &[u8], floor: usize, hard_end: usize) -> usize {
    let mut best = hard_end;
    let mut best_score = NO_BREAK;
    for p in (floor..=hard_end).rev() {
        if scores[p] > best_score {
            best = p;
            best_score = scores[p];
        }
    }
    best
}

/// Break score for every character position `0..=char_count`
fn boundary_scores(text: &str, offsets: &[usize]) -> Vec<u8> {
    let chars: Vec<char> = text.chars().collect();
    let mut scores = vec![NO_BREAK; chars.len() + 1];

    for p in 1..chars.len() {
        if chars[p - 1].is_whitespace() && !chars[p].is_whitespace() {
            scores[p] = WORD_BREAK;
        }
    }

    for (byte_idx, _) in text.split_sentence_bound_indices() {
        if let Ok(p) = offsets.binary_search(&byte_idx) {
            if p > 0 && p < chars.len() {
                scores[p] = scores[p].max(SENTENCE_BREAK);
            }
        }
    }

    for p in 2..chars.len() {
        if chars[p - 1] == '\n' && chars[p - 2] == '\n' {
            scores[p] = PARAGRAPH_BREAK;
        }
    }

    scores
}
