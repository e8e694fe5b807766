//! In-memory doubles for the pipeline's external dependencies.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::llm::{GenerationOptions, LlmClient, LlmError};
use super::lookup::InteractionLookup;
use super::web::{PageFetcher, SearchResult, WebError, WebSearcher};
use super::PipelineError;
use crate::models::SideEffectRecord;

// ═══════════════════════════════════════════════════════════
// LLM
// ═══════════════════════════════════════════════════════════

/// Replies from a script first, then the fallback. With no fallback and an
/// exhausted script every call fails with a connection error.
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(response.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(
        &self,
        prompt: &str,
        _system: &str,
        _options: &GenerationOptions,
    ) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return reply;
        }
        match &self.fallback {
            Some(response) => Ok(response.clone()),
            None => Err(LlmError::Connection("mock".into())),
        }
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

// ═══════════════════════════════════════════════════════════
// Web
// ═══════════════════════════════════════════════════════════

pub fn search_result(n: usize) -> SearchResult {
    SearchResult {
        title: format!("Source {n}"),
        url: format!("https://example.org/{n}"),
        snippet: String::new(),
    }
}

pub struct MockSearcher {
    results: Vec<SearchResult>,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Three ranked results, `https://example.org/1` through `/3`.
    pub fn three() -> Self {
        Self::new((1..=3).map(search_result).collect())
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl WebSearcher for MockSearcher {
    fn search(&self, query: &str, count: usize) -> Result<Vec<SearchResult>, WebError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(WebError::SearchStatus {
                status: 401,
                body: "invalid token".into(),
            });
        }
        Ok(self.results.iter().take(count).cloned().collect())
    }

    fn provider(&self) -> &'static str {
        "mock"
    }
}

/// Serves `Text from {url}` unless a page is registered or marked failing.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }

    pub fn with_failure(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }
}

impl PageFetcher for MockFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, WebError> {
        if self.failing.contains(url) {
            return Err(WebError::PageFetchFailed {
                url: url.to_string(),
                reason: "HTTP 404".into(),
                transient: false,
            });
        }
        Ok(self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| format!("Text from {url}")))
    }
}

// ═══════════════════════════════════════════════════════════
// Lookup
// ═══════════════════════════════════════════════════════════

#[derive(Default)]
pub struct MockLookup {
    records: Vec<SideEffectRecord>,
    fail: bool,
    delay: Option<Duration>,
    slow_drug: Option<String>,
    calls: AtomicUsize,
}

impl MockLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_record(mut self, drug_a: &str, drug_b: &str, side_effect: &str) -> Self {
        self.records.push(SideEffectRecord {
            drug_name_1: drug_a.to_string(),
            drug_name_2: drug_b.to_string(),
            side_effect_name: side_effect.to_string(),
        });
        self
    }

    /// Sleep before answering for pairs that mention `drug`.
    pub fn slow_for(mut self, drug: &str, delay: Duration) -> Self {
        self.slow_drug = Some(drug.to_lowercase());
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InteractionLookup for MockLookup {
    fn lookup(&self, drug_a: &str, drug_b: &str) -> Result<Vec<SideEffectRecord>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (a, b) = (drug_a.to_lowercase(), drug_b.to_lowercase());

        if let (Some(slow), Some(delay)) = (&self.slow_drug, self.delay) {
            if &a == slow || &b == slow {
                std::thread::sleep(delay);
            }
        }
        if self.fail {
            return Err(PipelineError::StorageUnavailable("mock store offline".into()));
        }

        Ok(self
            .records
            .iter()
            .filter(|r| {
                let (x, y) = (r.drug_name_1.to_lowercase(), r.drug_name_2.to_lowercase());
                (x == a && y == b) || (x == b && y == a)
            })
            .cloned()
            .collect())
    }
}
