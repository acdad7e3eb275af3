//! HTTP-facing error surface.
//!
//! Every internal failure collapses into one of a small set of stable error
//! codes so clients can branch on `code` without parsing messages.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::database::{ConflictField, MetadataError};
use crate::uploads::UploadError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no file uploaded")]
    NoFile,

    #[error("a file with this URL already exists; use a different name or file")]
    DuplicateUrl,

    #[error("{field} already exists; use a different name or file")]
    Conflict { field: ConflictField },

    #[error("metadata store fault: {0}")]
    StoreFault(String),

    #[error("file stored but QR generation failed")]
    ArtifactGenerationFailed { file_id: i64, pdf_url: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFile => "no_file",
            Self::DuplicateUrl => "duplicate_url",
            Self::Conflict { .. } => "conflict",
            Self::StoreFault(_) => "store_fault",
            Self::ArtifactGenerationFailed { .. } => "artifact_generation_failed",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoFile => StatusCode::BAD_REQUEST,
            Self::DuplicateUrl | Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::StoreFault(_)
            | Self::ArtifactGenerationFailed { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }

        let mut body = json!({
            "code": self.code(),
            "error": self.to_string(),
        });
        // Partial success carries enough context for the client to keep the
        // committed upload usable without the artifact.
        if let Self::ArtifactGenerationFailed { file_id, pdf_url } = &self {
            body["fileId"] = json!(file_id);
            body["pdfUrl"] = json!(pdf_url);
        }
        if let Self::Conflict { field } = &self {
            body["field"] = json!(field);
        }

        (status, Json(body)).into_response()
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::DuplicateUrl => Self::DuplicateUrl,
            UploadError::Conflict { field } => Self::Conflict { field },
            UploadError::Store(source) => Self::StoreFault(source.to_string()),
            UploadError::Io(source) => Self::Internal(source.to_string()),
            UploadError::ArtifactGeneration {
                file_id, file_url, ..
            } => Self::ArtifactGenerationFailed {
                file_id,
                pdf_url: file_url,
            },
        }
    }
}

impl From<MetadataError> for ApiError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::Conflict(ConflictField::FileUrl) => Self::DuplicateUrl,
            MetadataError::Conflict(field) => Self::Conflict { field },
            other => Self::StoreFault(other.to_string()),
        }
    }
}
