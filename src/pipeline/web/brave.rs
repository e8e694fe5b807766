use std::time::Duration;

use serde::Deserialize;

use super::{search_error, SearchResult, WebError, WebSearcher};

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
/// Brave caps `count` at 20.
const BRAVE_MAX_COUNT: usize = 20;

/// Brave Search API client.
pub struct BraveSearchClient {
    endpoint: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl BraveSearchClient {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, WebError> {
        Self::with_endpoint(BRAVE_ENDPOINT, api_key, timeout)
    }

    pub fn with_endpoint(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, WebError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(search_error)?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }
}

#[derive(Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

impl WebSearcher for BraveSearchClient {
    fn search(&self, query: &str, count: usize) -> Result<Vec<SearchResult>, WebError> {
        let count = count.clamp(1, BRAVE_MAX_COUNT).to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", count.as_str())])
            .send()
            .map_err(search_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(WebError::SearchStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: BraveResponse = response.json().map_err(search_error)?;
        Ok(into_results(parsed))
    }

    fn provider(&self) -> &'static str {
        "brave"
    }
}

fn into_results(parsed: BraveResponse) -> Vec<SearchResult> {
    parsed
        .web
        .map(|web| web.results)
        .unwrap_or_default()
        .into_iter()
        .map(|r| SearchResult {
            title: r.title,
            url: r.url,
            snippet: r.description,
        })
        .collect()
}
