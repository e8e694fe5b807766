//! Web evidence collector: ranked search results and readable page text.

pub mod brave;
pub mod fetch;
pub mod google;

pub use brave::*;
pub use fetch::*;
pub use google::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Search provider returned error (status {status}): {body}")]
    SearchStatus { status: u16, body: String },

    #[error("Search request failed: {0}")]
    Search(String),

    #[error("Failed to fetch {url}: {reason}")]
    PageFetchFailed {
        url: String,
        reason: String,
        transient: bool,
    },
}

impl WebError {
    pub fn is_retryable(&self) -> bool {
        match self {
            WebError::SearchStatus { status, .. } => *status == 429 || *status >= 500,
            WebError::Search(_) => true,
            WebError::PageFetchFailed { transient, .. } => *transient,
        }
    }
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub trait WebSearcher: Send + Sync {
    fn search(&self, query: &str, count: usize) -> Result<Vec<SearchResult>, WebError>;

    fn provider(&self) -> &'static str;
}

pub trait PageFetcher: Send + Sync {
    /// Readable text of the page at `url`; may be empty.
    fn fetch_text(&self, url: &str) -> Result<String, WebError>;
}

pub(crate) fn search_error(e: reqwest::Error) -> WebError {
    WebError::Search(e.to_string())
}
