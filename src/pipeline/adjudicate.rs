//! Report adjudication: one severity verdict from all gathered evidence.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::llm::{GenerationOptions, LlmClient, LlmError};
use super::{PipelineError, RetryPolicy, TokenBucket};
use crate::models::{AdjudicatedVerdict, Severity, SideEffectRecord};

const ADJUDICATION_SYSTEM_PROMPT: &str = "You are a clinical pharmacology reviewer. \
You answer only in the exact output format requested.";

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Structured evidence for one pair whose lookup succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairEvidence {
    pub pair: String,
    pub side_effects: Vec<SideEffectRecord>,
}

/// Exact shape the model must return inside the fence.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVerdict {
    severity: String,
    report: String,
    reasoning: String,
}

pub fn build_adjudication_prompt(
    structured: &[PairEvidence],
    narratives: &[String],
    notes: &[String],
) -> String {
    let structured_json =
        serde_json::to_string_pretty(structured).unwrap_or_else(|_| "[]".to_string());
    let narrative_text = if narratives.is_empty() {
        "(no narrative analyses available)".to_string()
    } else {
        narratives.join("\n\n")
    };

    let mut prompt = format!(
        "Task: Produce a final drug interaction assessment for a patient from the evidence below.\n\n\
         Structured interaction records (JSON, grouped per drug pair):\n{structured_json}\n\n\
         Narrative analyses:\n{narrative_text}\n\n"
    );

    if !notes.is_empty() {
        prompt.push_str("Evidence notes:\n");
        for note in notes {
            prompt.push_str("- ");
            prompt.push_str(note);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str(&output_contract());
    prompt
}

/// Base prompt plus the reason the last reply was rejected.
pub fn build_strict_retry_prompt(base_prompt: &str, error: &PipelineError) -> String {
    format!(
        "{base_prompt}\n\
         Your previous reply could not be used: {error}.\n\
         Reply with exactly one ```json fenced block holding a single JSON object with \
         exactly the keys \"severity\", \"report\" and \"reasoning\", all strings. \
         Do not write anything outside the block.\n"
    )
}

fn output_contract() -> String {
    let labels: Vec<&str> = Severity::all().iter().map(Severity::as_str).collect();
    format!(
        "Weigh the structured records and the narrative analyses together. Support the \
         verdict with a final report and detailed reasoning.\n\n\
         Output format:\n\
         ```json\n\
         {{\"severity\": \"Severity\", \"report\": \"Report\", \"reasoning\": \"Reasoning\"}}\n\
         ```\n\n\
         The severity must be one of: {}.\n",
        labels.join(", ")
    )
}

/// Strictly decode a model reply into a verdict.
pub fn parse_verdict(response: &str) -> Result<AdjudicatedVerdict, PipelineError> {
    let body = fenced_json(response)?;

    let raw: RawVerdict = serde_json::from_str(body.trim())
        .map_err(|e| PipelineError::AdjudicationParseError(format!("invalid verdict JSON: {e}")))?;

    let severity: Severity = raw
        .severity
        .parse()
        .map_err(|_| PipelineError::AdjudicationInvalidSeverity(raw.severity.clone()))?;

    Ok(AdjudicatedVerdict {
        severity,
        report: raw.report,
        reasoning: raw.reasoning,
    })
}

fn fenced_json(response: &str) -> Result<&str, PipelineError> {
    let mut openings = response.match_indices(JSON_FENCE);
    let start = match (openings.next(), openings.next()) {
        (Some((idx, _)), None) => idx + JSON_FENCE.len(),
        (None, _) => {
            return Err(PipelineError::AdjudicationParseError(
                "no ```json fenced block in response".into(),
            ))
        }
        (Some(_), Some(_)) => {
            return Err(PipelineError::AdjudicationParseError(
                "more than one ```json fenced block in response".into(),
            ))
        }
    };

    let rest = &response[start..];
    let end = rest.find(FENCE).ok_or_else(|| {
        PipelineError::AdjudicationParseError("unclosed ```json fenced block".into())
    })?;
    Ok(&rest[..end])
}

pub struct Adjudicator {
    llm: Arc<dyn LlmClient>,
    options: GenerationOptions,
    /// Total generations allowed, including the first.
    max_attempts: u32,
    retry: RetryPolicy,
    limiter: Arc<TokenBucket>,
}

impl Adjudicator {
    pub fn new(llm: Arc<dyn LlmClient>, options: GenerationOptions, max_attempts: u32) -> Self {
        Self {
            llm,
            options,
            max_attempts: max_attempts.max(1),
            retry: RetryPolicy::none(),
            limiter: Arc::new(TokenBucket::unlimited("llm")),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_limiter(mut self, limiter: Arc<TokenBucket>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Ask the model for a verdict, regenerating with a stricter prompt when
    /// the reply breaks the output contract.
    pub fn adjudicate(
        &self,
        structured: &[PairEvidence],
        narratives: &[String],
        notes: &[String],
    ) -> Result<AdjudicatedVerdict, PipelineError> {
        let base_prompt = build_adjudication_prompt(structured, narratives, notes);
        let mut prompt = base_prompt.clone();
        let mut attempt = 1;

        loop {
            let response = self.generate(&prompt)?;
            match parse_verdict(&response) {
                Ok(verdict) => {
                    tracing::info!(
                        severity = verdict.severity.as_str(),
                        attempt,
                        "Adjudication complete"
                    );
                    return Ok(verdict);
                }
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Adjudication reply rejected, regenerating"
                    );
                    prompt = build_strict_retry_prompt(&base_prompt, &e);
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "Adjudication failed");
                    return Err(e);
                }
            }
        }
    }

    fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        self.retry
            .run(
                "adjudication_generation",
                || {
                    self.limiter.acquire();
                    self.llm
                        .generate(prompt, ADJUDICATION_SYSTEM_PROMPT, &self.options)
                },
                LlmError::is_retryable,
            )
            .map_err(|e| {
                tracing::warn!(model = self.llm.model_name(), error = %e, "Adjudication generation failed");
                PipelineError::from(e)
            })
    }
}
