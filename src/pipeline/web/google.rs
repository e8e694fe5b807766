use std::time::Duration;

use serde::Deserialize;

use super::{search_error, SearchResult, WebError, WebSearcher};

const GOOGLE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
/// Custom Search returns at most 10 items per request.
const GOOGLE_MAX_NUM: usize = 10;

/// Google Custom Search JSON API client.
pub struct GoogleSearchClient {
    endpoint: String,
    api_key: String,
    engine_id: String,
    client: reqwest::blocking::Client,
}

impl GoogleSearchClient {
    pub fn new(api_key: &str, engine_id: &str, timeout: Duration) -> Result<Self, WebError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(search_error)?;
        Ok(Self {
            endpoint: GOOGLE_ENDPOINT.to_string(),
            api_key: api_key.to_string(),
            engine_id: engine_id.to_string(),
            client,
        })
    }
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Deserialize)]
struct GoogleItem {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

impl WebSearcher for GoogleSearchClient {
    fn search(&self, query: &str, count: usize) -> Result<Vec<SearchResult>, WebError> {
        let num = count.clamp(1, GOOGLE_MAX_NUM).to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
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

        let parsed: GoogleResponse = response.json().map_err(search_error)?;
        Ok(into_results(parsed))
    }

    fn provider(&self) -> &'static str {
        "google"
    }
}

fn into_results(parsed: GoogleResponse) -> Vec<SearchResult> {
    parsed
        .items
        .into_iter()
        .map(|item| SearchResult {
            title: item.title,
            url: item.link,
            snippet: item.snippet,
        })
        .collect()
}
