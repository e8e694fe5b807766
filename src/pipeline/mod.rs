//! Interaction-resolution pipeline.
//!
//! Leaf gateways (`llm`, `web`, `lookup`) feed the narrative analyzer and the
//! adjudicator; `resolver` orchestrates them per request.

pub mod adjudicate;
pub mod llm;
pub mod lookup;
pub mod narrative;
pub mod resolver;
pub mod retry;
pub mod throttle;
pub mod web;

#[cfg(test)]
pub mod testing;

pub use adjudicate::*;
pub use lookup::*;
pub use narrative::*;
pub use resolver::*;
pub use retry::*;
pub use throttle::*;

use thiserror::Error;

use crate::models::EmptyDrugName;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Interaction storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Narrative analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    #[error("Page fetch failed for {url}: {reason}")]
    PageFetchFailed { url: String, reason: String },

    #[error("Could not parse adjudication response: {0}")]
    AdjudicationParseError(String),

    #[error("Adjudication returned an invalid severity: {0:?}")]
    AdjudicationInvalidSeverity(String),

    #[error("No evidence could be gathered for any drug pair")]
    NoEvidenceAvailable,

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Deadline reached before any evidence was gathered")]
    DeadlineExceeded,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EmptyDrugName> for PipelineError {
    fn from(err: EmptyDrugName) -> Self {
        PipelineError::InvalidInput(err.to_string())
    }
}

impl From<web::WebError> for PipelineError {
    fn from(err: web::WebError) -> Self {
        match err {
            web::WebError::PageFetchFailed { url, reason, .. } => {
                PipelineError::PageFetchFailed { url, reason }
            }
            other => PipelineError::AnalysisUnavailable(other.to_string()),
        }
    }
}

impl From<llm::LlmError> for PipelineError {
    fn from(err: llm::LlmError) -> Self {
        PipelineError::AnalysisUnavailable(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Internal(format!("pipeline task failed: {err}"))
    }
}
