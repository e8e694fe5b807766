//! API error types with structured JSON responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::PipelineError;

/// Error body: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Upstream failure ({code}): {message}")]
    Upstream { code: &'static str, message: String },
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::MissingCredentials(detail) => {
                tracing::error!(detail = %detail, "Request refused, credentials not configured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "MISSING_CREDENTIALS",
                    "Required API credentials are not configured".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Upstream { code, message } => {
                tracing::warn!(code, message = %message, "Upstream failure");
                (StatusCode::BAD_GATEWAY, code, message)
            }
            ApiError::StorageUnavailable(detail) => {
                tracing::warn!(detail = %detail, "Storage unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORAGE_UNAVAILABLE",
                    "The interaction database is unavailable".to_string(),
                )
            }
            ApiError::DeadlineExceeded => (
                StatusCode::GATEWAY_TIMEOUT,
                "DEADLINE_EXCEEDED",
                "No evidence was gathered before the request deadline".to_string(),
            ),
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::InvalidInput(detail) => ApiError::BadRequest(detail),
            PipelineError::MissingCredentials(detail) => ApiError::MissingCredentials(detail),
            PipelineError::StorageUnavailable(detail) => ApiError::StorageUnavailable(detail),
            PipelineError::DeadlineExceeded => ApiError::DeadlineExceeded,
            PipelineError::Internal(detail) => ApiError::Internal(detail),
            PipelineError::AnalysisUnavailable(_) => ApiError::Upstream {
                code: "ANALYSIS_UNAVAILABLE",
                message,
            },
            PipelineError::PageFetchFailed { .. } => ApiError::Upstream {
                code: "PAGE_FETCH_FAILED",
                message,
            },
            PipelineError::AdjudicationParseError(_) => ApiError::Upstream {
                code: "ADJUDICATION_PARSE_ERROR",
                message,
            },
            PipelineError::AdjudicationInvalidSeverity(_) => ApiError::Upstream {
                code: "ADJUDICATION_INVALID_SEVERITY",
                message,
            },
            PipelineError::NoEvidenceAvailable => ApiError::Upstream {
                code: "NO_EVIDENCE_AVAILABLE",
                message,
            },
        }
    }
}

/// Malformed and schema-invalid bodies are both 400.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
