//! Ingestion pipeline: parse, chunk, embed, index

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::providers::EmbeddingProvider;
use crate::retrieval::VectorIndex;
use crate::types::{DocumentChunk, DocumentSource, FileType};

use super::chunker::TextChunker;
use super::parser::DocumentParser;

/// Outcome of ingesting a directory
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// (document id, chunks indexed)
    pub ingested: Vec<(String, usize)>,
    /// (file, error message)
    pub failed: Vec<(PathBuf, String)>,
}

impl IngestReport {
    pub fn total_chunks(&self) -> usize {
        self.ingested.iter().map(|(_, n)| n).sum()
    }
}

pub struct IngestPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
}

impl IngestPipeline {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
        }
    }

    /// Index one document, returning the number of chunks indexed.
    ///
    /// Re-ingesting a document id replaces its previous chunks in one step.
    /// Nothing is touched if parsing or embedding fails.
    pub async fn ingest(&self, source: &DocumentSource) -> Result<usize> {
        let parsed = DocumentParser::extract(&source.content).await?;

        // Chunks never span a page break, so each keeps its page number
        let (pages, texts): (Vec<Option<u32>>, Vec<String>) = parsed
            .sections()
            .into_iter()
            .flat_map(|(page, text)| {
                self.chunker
                    .chunk(text)
                    .into_iter()
                    .map(move |span| (page, span.text.trim().to_string()))
            })
            .filter(|(_, t)| !t.is_empty())
            .unzip();

        if texts.is_empty() {
            tracing::warn!(document_id = %source.document_id, "Document has no text to index");
        }

        let vectors = self.embedder.embed_batch(&texts).await?;
        let chunks: Vec<DocumentChunk> = texts
            .into_iter()
            .zip(vectors)
            .zip(pages)
            .enumerate()
            .map(|(i, ((text, vector), page))| {
                DocumentChunk::new(source.document_id.clone(), i as u32, text, vector).with_page(page)
            })
            .collect();

        let count = self.index.replace_document(&source.document_id, chunks)?;
        tracing::info!(document_id = %source.document_id, chunks = count, "Indexed document");
        Ok(count)
    }

    /// Ingest every supported file under `dir`, in path order. A file that
    /// fails is reported and skipped.
    pub async fn ingest_directory(&self, dir: &Path) -> Result<IngestReport> {
        let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| FileType::from_path(p).is_supported())
            .collect();
        paths.sort();

        if paths.is_empty() && !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", dir.display()),
            )
            .into());
        }

        let mut report = IngestReport::default();
        for path in paths {
            let source = DocumentSource::from_path(&path);
            match self.ingest(&source).await {
                Ok(count) => report.ingested.push((source.document_id, count)),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Skipping guideline file");
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        tracing::info!(
            documents = report.ingested.len(),
            failed = report.failed.len(),
            chunks = report.total_chunks(),
            "Directory ingestion complete"
        );
        Ok(report)
    }
}
