//! Error types for the antenatal assistant

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown to end users when a chat request could not be completed
pub const RETRY_MESSAGE: &str = "Could not generate an answer, please retry.";

/// Assistant errors
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed configuration (chunking parameters, threshold tables, ...).
    /// Fatal at load time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed input rejected at the boundary
    #[error("Validation error: {0}")]
    Validation(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// The generation backend did not answer within the timeout
    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(std::time::Duration),

    /// The generation backend reported an error
    #[error("Generation failed: {0}")]
    Generation(String),

    /// No completion could be obtained (retry exhausted or queue timeout)
    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// No threshold rules are configured for this factor
    #[error("Unknown risk factor: {0}")]
    UnknownFactor(String),

    /// Vector index error
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// No chunks indexed under this document id
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Errors scoped to a single chat request. The caller may retry or
    /// degrade; the service itself keeps serving.
    pub fn is_request_scoped(&self) -> bool {
        matches!(
            self,
            Error::Embedding(_)
                | Error::GenerationTimeout(_)
                | Error::Generation(_)
                | Error::GenerationUnavailable(_)
        )
    }

    /// Text suitable for showing to an end user
    pub fn user_message(&self) -> String {
        if self.is_request_scoped() {
            RETRY_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Error::Embedding(_) => (StatusCode::SERVICE_UNAVAILABLE, "embedding_error"),
            Error::GenerationTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "generation_timeout"),
            Error::Generation(_) => (StatusCode::SERVICE_UNAVAILABLE, "generation_error"),
            Error::GenerationUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "generation_unavailable")
            }
            Error::UnknownFactor(_) => (StatusCode::BAD_REQUEST, "unknown_factor"),
            Error::VectorIndex(_) => (StatusCode::INTERNAL_SERVER_ERROR, "vector_index_error"),
            Error::FileParse { .. } => (StatusCode::BAD_REQUEST, "parse_error"),
            Error::DocumentNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::UnsupportedFileType(_) => (StatusCode::BAD_REQUEST, "unsupported_type"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            tracing::warn!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.user_message(),
            }
        }));

        (status, body).into_response()
    }
}
