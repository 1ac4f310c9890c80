//! Guideline ingestion endpoints

use axum::{
    extract::{Multipart, Path as UrlPath, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::ingestion::IngestReport;
use crate::retrieval::IndexStats;
use crate::server::state::AppState;
use crate::types::DocumentSource;

/// Either inline text (with an id) or a file under the guidelines directory
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl IngestRequest {
    async fn into_source(self, state: &AppState) -> Result<DocumentSource> {
        match (self.text, self.path) {
            (Some(text), None) => {
                let id = self
                    .document_id
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| Error::validation("document_id is required with text"))?;
                Ok(DocumentSource::text(id, text))
            }
            (None, Some(path)) => {
                let path = resolve_guideline_path(state, &path).await?;
                let is_file = tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false);
                if !is_file {
                    return Err(Error::validation(format!("{} is not a file", path.display())));
                }
                let mut source = DocumentSource::from_path(path);
                if let Some(id) = self.document_id.filter(|id| !id.trim().is_empty()) {
                    source.document_id = id;
                }
                Ok(source)
            }
            _ => Err(Error::validation("provide exactly one of text or path")),
        }
    }
}

/// Resolve a client-supplied path inside the configured guidelines
/// directory. Relative paths are taken from that directory; symlinks and
/// `..` are resolved before the containment check.
async fn resolve_guideline_path(state: &AppState, requested: &Path) -> Result<PathBuf> {
    let root = state
        .config()
        .ingestion
        .guidelines_dir
        .as_ref()
        .ok_or_else(|| Error::validation("server-side paths are disabled; no guidelines directory is configured"))?;
    let root = tokio::fs::canonicalize(root).await.map_err(|e| {
        Error::configuration(format!("guidelines directory {}: {}", root.display(), e))
    })?;

    let outside = || {
        Error::validation(format!(
            "{} is not inside the guidelines directory",
            requested.display()
        ))
    };
    let resolved = tokio::fs::canonicalize(root.join(requested))
        .await
        .map_err(|_| outside())?;
    if !resolved.starts_with(&root) {
        tracing::warn!(path = %requested.display(), "Rejected ingest path outside the guidelines directory");
        return Err(outside());
    }
    Ok(resolved)
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub documents: Vec<IngestedDocument>,
    pub total_chunks: usize,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct IngestedDocument {
    pub document_id: String,
    pub chunks_indexed: usize,
}

/// POST /api/ingest - Index one document from text or a path
pub async fn ingest_document(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>> {
    let start = Instant::now();
    let source = request.into_source(&state).await?;
    let chunks = state.assistant().ingest(&source).await?;

    tracing::info!(document_id = %source.document_id, chunks, "Document ingested");

    Ok(Json(IngestResponse {
        documents: vec![IngestedDocument {
            document_id: source.document_id,
            chunks_indexed: chunks,
        }],
        total_chunks: chunks,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// POST /api/ingest/upload - Index uploaded files, keyed by file stem
pub async fn ingest_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>> {
    let start = Instant::now();
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::validation(format!("Failed to read {}: {}", filename, e)))?;

        let document_id = std::path::Path::new(&filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.clone());

        let source = DocumentSource::bytes(document_id.clone(), filename, data.to_vec());
        let chunks = state.assistant().ingest(&source).await?;
        documents.push(IngestedDocument {
            document_id,
            chunks_indexed: chunks,
        });
    }

    if documents.is_empty() {
        return Err(Error::validation("no files in upload"));
    }

    Ok(Json(IngestResponse {
        total_chunks: documents.iter().map(|d| d.chunks_indexed).sum(),
        documents,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct DirectoryRequest {
    /// Sub-directory of the guidelines directory; the whole tree when absent
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// POST /api/ingest/directory - Index every supported file under a
/// directory inside the guidelines directory
pub async fn ingest_directory(
    State(state): State<AppState>,
    Json(request): Json<DirectoryRequest>,
) -> Result<Json<IngestReport>> {
    let requested = request.directory.unwrap_or_else(|| PathBuf::from("."));
    let directory = resolve_guideline_path(&state, &requested).await?;
    let report = state.assistant().ingest_directory(&directory).await?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct RemovedDocument {
    pub document_id: String,
    pub chunks_removed: usize,
}

/// DELETE /api/documents/:document_id - Drop a document from the index
pub async fn delete_document(
    State(state): State<AppState>,
    UrlPath(document_id): UrlPath<String>,
) -> Result<Json<RemovedDocument>> {
    let chunks_removed = state.assistant().remove_document(&document_id)?;
    Ok(Json(RemovedDocument {
        document_id,
        chunks_removed,
    }))
}

/// GET /api/index/stats
pub async fn index_stats(State(state): State<AppState>) -> Json<IndexStats> {
    Json(state.assistant().index_stats())
}
