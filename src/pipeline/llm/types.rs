use super::LlmError;

/// Sampling controls for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    /// Low temperature: factual summaries over creative ones.
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 2048,
        }
    }
}

/// LLM client abstraction (allows mocking)
pub trait LlmClient: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        system: &str,
        options: &GenerationOptions,
    ) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}
