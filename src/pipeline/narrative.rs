//! Narrative interaction analysis: web search, page text, LLM write-up.

use std::fmt::Write as _;
use std::sync::Arc;

use super::llm::{GenerationOptions, LlmClient, LlmError};
use super::web::{PageFetcher, WebError, WebSearcher};
use super::{PipelineError, RetryPolicy, TokenBucket};
use crate::models::{DrugPair, NarrativeAnalysis, SourceRef, WebEvidenceItem};

const NARRATIVE_SYSTEM_PROMPT: &str = "You are a clinical pharmacology assistant. \
You summarize published evidence about drug interactions accurately and never invent findings.";

const EMPTY_SOURCE_TEXT: &str = "(no readable text extracted)";

#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    /// Search results requested per pair.
    pub result_count: usize,
    /// Cap on extracted text per source, in characters.
    pub max_source_chars: usize,
    pub generation: GenerationOptions,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            result_count: 3,
            max_source_chars: 6_000,
            generation: GenerationOptions::default(),
        }
    }
}

/// One limiter per external dependency, shared by every pair worker.
#[derive(Debug, Clone)]
pub struct NarrativeLimiters {
    pub search: Arc<TokenBucket>,
    pub fetch: Arc<TokenBucket>,
    pub llm: Arc<TokenBucket>,
}

impl Default for NarrativeLimiters {
    fn default() -> Self {
        Self {
            search: Arc::new(TokenBucket::unlimited("search")),
            fetch: Arc::new(TokenBucket::unlimited("fetch")),
            llm: Arc::new(TokenBucket::unlimited("llm")),
        }
    }
}

pub struct NarrativeAnalyzer {
    searcher: Arc<dyn WebSearcher>,
    fetcher: Arc<dyn PageFetcher>,
    llm: Arc<dyn LlmClient>,
    config: NarrativeConfig,
    retry: RetryPolicy,
    limiters: NarrativeLimiters,
}

impl NarrativeAnalyzer {
    pub fn new(
        searcher: Arc<dyn WebSearcher>,
        fetcher: Arc<dyn PageFetcher>,
        llm: Arc<dyn LlmClient>,
        config: NarrativeConfig,
    ) -> Self {
        Self {
            searcher,
            fetcher,
            llm,
            config,
            retry: RetryPolicy::none(),
            limiters: NarrativeLimiters::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_limiters(mut self, limiters: NarrativeLimiters) -> Self {
        self.limiters = limiters;
        self
    }

    /// Search, scrape and summarize evidence for one pair.
    ///
    /// Individual page failures are dropped; search or generation failures
    /// after retries are `AnalysisUnavailable`.
    pub fn analyze(&self, pair: &DrugPair) -> Result<NarrativeAnalysis, PipelineError> {
        let query = search_query(pair);

        let results = self
            .retry
            .run(
                "web_search",
                || {
                    self.limiters.search.acquire();
                    self.searcher.search(&query, self.config.result_count)
                },
                WebError::is_retryable,
            )
            .map_err(|e| {
                tracing::warn!(
                    pair = %pair.label(),
                    provider = self.searcher.provider(),
                    error = %e,
                    "Web search failed"
                );
                PipelineError::AnalysisUnavailable(format!("web search failed: {e}"))
            })?;

        let sources_requested = self.config.result_count;
        let mut evidence = Vec::with_capacity(results.len());
        for result in results {
            let fetched = self.retry.run(
                "page_fetch",
                || {
                    self.limiters.fetch.acquire();
                    self.fetcher.fetch_text(&result.url)
                },
                WebError::is_retryable,
            );
            match fetched {
                Ok(text) => evidence.push(WebEvidenceItem {
                    url: result.url,
                    title: result.title,
                    extracted_text: truncate_chars(&text, self.config.max_source_chars).to_string(),
                }),
                Err(e) => {
                    let err = PipelineError::from(e);
                    tracing::warn!(pair = %pair.label(), error = %err, "Dropping source");
                }
            }
        }

        tracing::info!(
            pair = %pair.label(),
            sources_requested,
            sources_scraped = evidence.len(),
            "Web evidence gathered"
        );

        let prompt = build_narrative_prompt(pair, &query, &evidence);
        let response = self
            .retry
            .run(
                "narrative_generation",
                || {
                    self.limiters.llm.acquire();
                    self.llm
                        .generate(&prompt, NARRATIVE_SYSTEM_PROMPT, &self.config.generation)
                },
                LlmError::is_retryable,
            )
            .map_err(|e| {
                tracing::warn!(
                    pair = %pair.label(),
                    model = self.llm.model_name(),
                    error = %e,
                    "Narrative generation failed"
                );
                PipelineError::from(e)
            })?;

        Ok(NarrativeAnalysis {
            pair: pair.clone(),
            report: render_report(pair, &response),
            sources: evidence
                .iter()
                .map(|item| SourceRef {
                    title: item.title.clone(),
                    url: item.url.clone(),
                })
                .collect(),
            sources_requested,
            sources_scraped: evidence.len(),
        })
    }
}

pub fn search_query(pair: &DrugPair) -> String {
    format!(
        "{} {} interaction side effects medical",
        pair.first(),
        pair.second()
    )
}

pub fn build_narrative_prompt(pair: &DrugPair, query: &str, evidence: &[WebEvidenceItem]) -> String {
    let (a, b) = (pair.first(), pair.second());
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Task: Research potential interactions and side effects between {a} and {b}.\n"
    );
    let _ = writeln!(prompt, "Drugs being analyzed: {a} and {b}");
    let _ = writeln!(prompt, "Search query: \"{query}\"\n");

    if evidence.is_empty() {
        prompt.push_str("No web sources could be retrieved for this query.\n\n");
    } else {
        prompt.push_str("Sources found:\n\n");
        for (i, item) in evidence.iter().enumerate() {
            let text = if item.extracted_text.trim().is_empty() {
                EMPTY_SOURCE_TEXT
            } else {
                item.extracted_text.as_str()
            };
            let _ = writeln!(prompt, "<source id=\"{}\">", i + 1);
            let _ = writeln!(prompt, "Title: {}", item.title);
            let _ = writeln!(prompt, "URL: {}", item.url);
            let _ = writeln!(prompt, "Text:\n{text}");
            prompt.push_str("</source>\n\n");
        }
    }

    prompt.push_str(
        "Based on these sources and your medical knowledge:\n\
         1. Identify any known interactions between these two medications.\n\
         2. List the potential side effects of taking them together.\n\
         3. Rate the severity of the interaction as Minor, Moderate or Major.\n\
         4. Give recommendations for patients taking both medications.\n\n\
         Present the findings with headings. Cite sources inline by id, for example [1].\n\
         End with a disclaimer advising the reader to consult a healthcare professional.\n\
         If the sources do not hold enough information, state the limitations plainly \
         instead of filling gaps with unsupported claims.\n",
    );
    prompt
}

pub fn render_report(pair: &DrugPair, response: &str) -> String {
    format!(
        "# Drug Interaction Analysis Report\n\n\
         ## Medications Analyzed\n\
         - Drug 1: {}\n\
         - Drug 2: {}\n\n\
         ## Results\n{}\n",
        pair.first(),
        pair.second(),
        response.trim()
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
