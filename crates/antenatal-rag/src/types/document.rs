//! Guideline documents, indexed chunks and retrieved passages

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Supported guideline file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Markdown file
    Markdown,
    /// HTML document
    Html,
    /// Plain text file
    Txt,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "md" | "markdown" => Self::Markdown,
            "html" | "htm" => Self::Html,
            "txt" | "text" => Self::Txt,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a filename or path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Pdf => "PDF",
            Self::Markdown => "Markdown",
            Self::Html => "HTML",
            Self::Txt => "Text File",
            Self::Unknown => "Unknown",
        }
    }
}

/// Where the raw guideline content comes from
#[derive(Debug, Clone)]
pub enum SourceContent {
    /// A file on disk
    Path(PathBuf),
    /// Raw file bytes; the filename decides how they are parsed
    Bytes { filename: String, data: Vec<u8> },
    /// Already-extracted text
    Text(String),
}

/// A guideline document to ingest, keyed by a caller-chosen identifier
#[derive(Debug, Clone)]
pub struct DocumentSource {
    /// Stable document identifier; re-ingesting it replaces the old chunks
    pub document_id: String,
    pub content: SourceContent,
}

impl DocumentSource {
    /// Ingest a file, using its file stem as the document identifier
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let document_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            document_id,
            content: SourceContent::Path(path),
        }
    }

    /// Ingest already-extracted text
    pub fn text(document_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            content: SourceContent::Text(text.into()),
        }
    }

    /// Ingest raw file bytes
    pub fn bytes(
        document_id: impl Into<String>,
        filename: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            content: SourceContent::Bytes {
                filename: filename.into(),
                data,
            },
        }
    }
}

/// An embedded segment of a guideline document. Immutable once indexed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    /// Deterministic chunk ID derived from document ID and position
    pub id: Uuid,
    /// Identifier of the source document
    pub source_document_id: String,
    /// Position of this chunk within its document
    pub sequence_index: u32,
    /// Chunk text
    pub text: String,
    /// 1-based page the chunk was cut from (paginated formats only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Embedding vector
    pub vector: Vec<f32>,
}

impl DocumentChunk {
    pub fn new(
        source_document_id: impl Into<String>,
        sequence_index: u32,
        text: impl Into<String>,
        vector: Vec<f32>,
    ) -> Self {
        let source_document_id = source_document_id.into();
        Self {
            id: chunk_id(&source_document_id, sequence_index),
            source_document_id,
            sequence_index,
            text: text.into(),
            page_number: None,
            vector,
        }
    }

    pub fn with_page(mut self, page_number: Option<u32>) -> Self {
        self.page_number = page_number;
        self
    }
}

/// Stable chunk ID for a (document, position) pair
pub fn chunk_id(document_id: &str, sequence_index: u32) -> Uuid {
    let name = format!("{}#{}", document_id, sequence_index);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// A chunk returned for a query, with its similarity score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedPassage {
    pub chunk_id: Uuid,
    pub text: String,
    pub source_document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Cosine similarity to the query, in [-1, 1]
    pub similarity_score: f32,
}

impl RetrievedPassage {
    pub fn from_chunk(chunk: &DocumentChunk, similarity_score: f32) -> Self {
        Self {
            chunk_id: chunk.id,
            text: chunk.text.clone(),
            source_document_id: chunk.source_document_id.clone(),
            page_number: chunk.page_number,
            similarity_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_is_stable() {
        let a = DocumentChunk::new("who-anc-2016", 3, "text", vec![1.0]);
        let b = DocumentChunk::new("who-anc-2016", 3, "other text", vec![0.0]);
        let c = DocumentChunk::new("who-anc-2016", 4, "text", vec![1.0]);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_source_from_path_uses_stem() {
        let source = DocumentSource::from_path("/data/guidelines/nice-ng201.pdf");
        assert_eq!(source.document_id, "nice-ng201");
        assert_eq!(FileType::from_path("/data/guidelines/nice-ng201.pdf"), FileType::Pdf);
    }
}
