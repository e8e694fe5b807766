use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::models::{LlmBackend, MatchMode, SearchBackend};

/// Application-level constants
pub const APP_NAME: &str = "MedInteract";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_DATABASE_PATH: &str = "drug_interaction_database.sqlite3";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_MODEL: &str = "medgemma";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Fallback `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medinteract=info,tower_http=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),
}

/// Runtime settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub match_mode: MatchMode,
    pub storage_busy_timeout: Duration,

    pub llm_backend: LlmBackend,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub llm_timeout: Duration,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub adjudication_attempts: u32,

    pub search_backend: SearchBackend,
    pub search_api_key: Option<String>,
    pub google_cx: Option<String>,
    pub search_results: usize,
    pub http_timeout: Duration,
    pub max_source_chars: usize,

    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,

    pub pair_concurrency: usize,
    pub search_rate_per_sec: f64,
    pub fetch_rate_per_sec: f64,
    pub llm_rate_per_sec: f64,
    pub request_deadline: Duration,

    /// Empty or `*` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults only; nothing read from the environment.
    pub fn defaults() -> Self {
        // Every default below parses, so the lookup cannot fail.
        match Self::from_lookup(|_| None) {
            Ok(settings) => settings,
            Err(e) => unreachable!("built-in defaults rejected: {e}"),
        }
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let llm_backend: LlmBackend = parse_or(&get, "LLM_BACKEND", LlmBackend::Ollama)?;
        let (default_url, default_model) = match llm_backend {
            LlmBackend::Ollama => (DEFAULT_OLLAMA_URL, DEFAULT_OLLAMA_MODEL),
            LlmBackend::OpenAi => (DEFAULT_OPENAI_URL, DEFAULT_OPENAI_MODEL),
        };

        Ok(Self {
            bind_addr: parse_or(&get, "MEDINTERACT_ADDR", parse_default(DEFAULT_BIND_ADDR))?,
            database_path: get("MEDINTERACT_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            match_mode: parse_or(&get, "LOOKUP_MATCH_MODE", MatchMode::Exact)?,
            storage_busy_timeout: millis_or(&get, "STORAGE_BUSY_TIMEOUT_MS", 2_000)?,

            llm_backend,
            llm_base_url: get("LLM_BASE_URL").unwrap_or_else(|| default_url.to_string()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| default_model.to_string()),
            llm_api_key: get("LLM_API_KEY"),
            llm_timeout: secs_or(&get, "LLM_TIMEOUT_SECS", 120)?,
            temperature: parse_or(&get, "LLM_TEMPERATURE", 0.2)?,
            max_output_tokens: parse_or(&get, "LLM_MAX_TOKENS", 2048)?,
            adjudication_attempts: parse_or(&get, "ADJUDICATION_ATTEMPTS", 2)?,

            search_backend: parse_or(&get, "SEARCH_BACKEND", SearchBackend::Brave)?,
            search_api_key: get("SEARCH_API_KEY"),
            google_cx: get("GOOGLE_SEARCH_CX"),
            search_results: parse_or(&get, "SEARCH_RESULTS", 3)?,
            http_timeout: secs_or(&get, "HTTP_TIMEOUT_SECS", 10)?,
            max_source_chars: parse_or(&get, "MAX_SOURCE_CHARS", 6_000)?,

            max_retries: parse_or(&get, "MAX_RETRIES", 2)?,
            initial_backoff: millis_or(&get, "INITIAL_BACKOFF_MS", 500)?,
            max_backoff: millis_or(&get, "MAX_BACKOFF_MS", 8_000)?,

            pair_concurrency: parse_or(&get, "PAIR_CONCURRENCY", 4)?,
            search_rate_per_sec: parse_or(&get, "SEARCH_RATE_PER_SEC", 1.0)?,
            fetch_rate_per_sec: parse_or(&get, "FETCH_RATE_PER_SEC", 1.0)?,
            llm_rate_per_sec: parse_or(&get, "LLM_RATE_PER_SEC", 0.0)?,
            request_deadline: secs_or(&get, "REQUEST_DEADLINE_SECS", 90)?,

            cors_origins: get("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    /// Check that the selected backends have the secrets they need.
    pub fn validate_credentials(&self) -> Result<(), ConfigError> {
        if self.llm_backend == LlmBackend::OpenAi && self.llm_api_key.is_none() {
            return Err(ConfigError::MissingCredentials("LLM_API_KEY"));
        }
        if self.search_api_key.is_none() {
            return Err(ConfigError::MissingCredentials("SEARCH_API_KEY"));
        }
        if self.search_backend == SearchBackend::Google && self.google_cx.is_none() {
            return Err(ConfigError::MissingCredentials("GOOGLE_SEARCH_CX"));
        }
        Ok(())
    }
}

fn parse_default<T: FromStr>(raw: &str) -> T
where
    T::Err: std::fmt::Debug,
{
    match raw.parse() {
        Ok(v) => v,
        Err(e) => unreachable!("invalid built-in default {raw:?}: {e:?}"),
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn secs_or<G>(get: &G, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default).map(Duration::from_secs)
}

fn millis_or<G>(get: &G, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default).map(Duration::from_millis)
}
