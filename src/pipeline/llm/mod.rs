//! Text generation gateway: "submit a prompt, receive generated text".

pub mod ollama;
pub mod openai;
pub mod types;

pub use ollama::*;
pub use openai::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM backend is not reachable at {0}")]
    Connection(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM backend returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl LlmError {
    /// Connection problems, timeouts, throttling and server errors are
    /// worth another attempt; client errors and bad payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Connection(_) | LlmError::Timeout(_) | LlmError::HttpClient(_) => true,
            LlmError::Upstream { status, .. } => *status == 429 || *status >= 500,
            LlmError::ResponseParsing(_) | LlmError::EmptyResponse => false,
        }
    }

    pub(crate) fn from_reqwest(e: reqwest::Error, base_url: &str, timeout_secs: u64) -> Self {
        if e.is_connect() {
            LlmError::Connection(base_url.to_string())
        } else if e.is_timeout() {
            LlmError::Timeout(timeout_secs)
        } else {
            LlmError::HttpClient(e.to_string())
        }
    }
}
