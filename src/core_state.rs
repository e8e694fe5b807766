//! Application state shared by every HTTP handler.
//!
//! Built once at startup from `Settings`: external clients are constructed
//! here and injected into the pipeline, never looked up globally.

use std::sync::Arc;

use tokio::time::Instant;

use crate::config::Settings;
use crate::db;
use crate::models::{LlmBackend, SearchBackend};
use crate::pipeline::llm::{GenerationOptions, LlmClient, LlmError, OllamaClient, OpenAiClient};
use crate::pipeline::web::{
    BraveSearchClient, GoogleSearchClient, HttpPageFetcher, WebError, WebSearcher,
};
use crate::pipeline::{
    Adjudicator, InteractionResolver, NarrativeAnalyzer, NarrativeConfig, NarrativeLimiters,
    PipelineError, RetryPolicy, SqliteInteractionStore, TokenBucket,
};

pub struct CoreState {
    pub settings: Settings,
    resolver: InteractionResolver,
    /// Set when startup validation found a missing secret; analysis
    /// requests fail until the service is restarted with it.
    missing_credentials: Option<String>,
}

impl CoreState {
    pub fn new(settings: Settings, resolver: InteractionResolver) -> Self {
        Self {
            settings,
            resolver,
            missing_credentials: None,
        }
    }

    /// Wire up storage, search, fetch and generation clients from settings.
    ///
    /// Creates and migrates the database file if it does not exist yet.
    /// Missing credentials are logged, not fatal.
    pub fn from_settings(settings: Settings) -> Result<Self, CoreError> {
        drop(db::open_database(&settings.database_path)?);

        let missing_credentials = settings.validate_credentials().err().map(|e| {
            tracing::warn!(error = %e, "Analysis endpoints will fail until credentials are provided");
            e.to_string()
        });

        let retry = RetryPolicy {
            max_retries: settings.max_retries,
            initial_backoff: settings.initial_backoff,
            max_backoff: settings.max_backoff,
        };
        let generation = GenerationOptions {
            temperature: settings.temperature,
            max_tokens: settings.max_output_tokens,
        };
        let limiters = NarrativeLimiters {
            search: Arc::new(TokenBucket::new("search", settings.search_rate_per_sec, 1)),
            fetch: Arc::new(TokenBucket::new("fetch", settings.fetch_rate_per_sec, 1)),
            llm: Arc::new(TokenBucket::new("llm", settings.llm_rate_per_sec, 1)),
        };

        let llm = build_llm_client(&settings)?;
        let searcher = build_searcher(&settings)?;
        let fetcher = Arc::new(HttpPageFetcher::new(settings.http_timeout)?);

        let analyzer = NarrativeAnalyzer::new(
            searcher,
            fetcher,
            Arc::clone(&llm),
            NarrativeConfig {
                result_count: settings.search_results,
                max_source_chars: settings.max_source_chars,
                generation,
            },
        )
        .with_retry(retry.clone())
        .with_limiters(limiters.clone());

        let adjudicator = Adjudicator::new(llm, generation, settings.adjudication_attempts)
            .with_retry(retry.clone())
            .with_limiter(limiters.llm);

        let lookup = Arc::new(
            SqliteInteractionStore::new(
                &settings.database_path,
                settings.match_mode,
                settings.storage_busy_timeout,
            )
            .with_retry(retry),
        );

        let resolver =
            InteractionResolver::new(lookup, analyzer, adjudicator, settings.pair_concurrency);

        tracing::info!(
            llm_backend = settings.llm_backend.as_str(),
            model = %settings.llm_model,
            search_backend = settings.search_backend.as_str(),
            database = %settings.database_path.display(),
            match_mode = settings.match_mode.as_str(),
            "Core state ready"
        );

        Ok(Self {
            settings,
            resolver,
            missing_credentials,
        })
    }

    pub fn with_missing_credentials(mut self, detail: &str) -> Self {
        self.missing_credentials = Some(detail.to_string());
        self
    }

    /// The resolver, once credentials are known to be present.
    pub fn resolver(&self) -> Result<&InteractionResolver, PipelineError> {
        match &self.missing_credentials {
            Some(detail) => Err(PipelineError::MissingCredentials(detail.clone())),
            None => Ok(&self.resolver),
        }
    }

    /// Deadline for a request starting now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.settings.request_deadline
    }
}

fn build_llm_client(settings: &Settings) -> Result<Arc<dyn LlmClient>, CoreError> {
    let timeout_secs = settings.llm_timeout.as_secs();
    Ok(match settings.llm_backend {
        LlmBackend::Ollama => Arc::new(OllamaClient::new(
            &settings.llm_base_url,
            &settings.llm_model,
            timeout_secs,
        )?),
        LlmBackend::OpenAi => Arc::new(OpenAiClient::new(
            &settings.llm_base_url,
            &settings.llm_model,
            settings.llm_api_key.as_deref().unwrap_or_default(),
            timeout_secs,
        )?),
    })
}

fn build_searcher(settings: &Settings) -> Result<Arc<dyn WebSearcher>, CoreError> {
    let api_key = settings.search_api_key.as_deref().unwrap_or_default();
    Ok(match settings.search_backend {
        SearchBackend::Brave => Arc::new(BraveSearchClient::new(api_key, settings.http_timeout)?),
        SearchBackend::Google => Arc::new(GoogleSearchClient::new(
            api_key,
            settings.google_cx.as_deref().unwrap_or_default(),
            settings.http_timeout,
        )?),
    })
}

/// Errors from building `CoreState`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("LLM client error: {0}")]
    Llm(#[from] LlmError),
    #[error("Web client error: {0}")]
    Web(#[from] WebError),
}
