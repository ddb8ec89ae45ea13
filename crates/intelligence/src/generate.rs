//! Text generation
//!
//! [`Generator`] is the opaque `generate(prompt) -> text` step at the end of
//! the RAG flow. [`ApiGenerator`] calls an OpenAI-compatible
//! `{endpoint}/chat/completions` and returns `choices[0].message.content`.

use ragline_core::{ModelConfig, RagError, RagResult, RequestContext};
use serde_json::Value;
use tracing::warn;

use crate::llm_client::{truncate, Endpoint};

/// Produces text from a rendered prompt
///
/// Failures surface as `GenerationFailed`.
pub trait Generator: Send + Sync {
    /// Generate a completion for `prompt`
    fn generate(&self, ctx: &RequestContext, prompt: &str) -> RagResult<String>;
}

/// Default sampling temperature
const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default max tokens for an answer
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Generator backed by an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone)]
pub struct ApiGenerator {
    endpoint: Endpoint,
    /// Sampling temperature (default: 0.7)
    temperature: f32,
    /// Maximum response tokens (default: 1024)
    max_tokens: u32,
}

impl ApiGenerator {
    /// Create a new ApiGenerator.
    ///
    /// `endpoint` should be the base URL (e.g. "http://localhost:11434/v1").
    /// The `/chat/completions` path is appended automatically.
    pub fn new(endpoint: &str, model: &str, api_key: Option<&str>, timeout_ms: u64) -> Self {
        ApiGenerator {
            endpoint: Endpoint::new(endpoint, "chat/completions", model, api_key, timeout_ms),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Create from a `[generation]` config section
    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(
            &config.endpoint,
            &config.model,
            config.api_key.as_deref(),
            config.timeout_ms,
        )
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the maximum response tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn request_body(&self, prompt: &str) -> Value {
        serde_json::json!({
            "model": self.endpoint.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

/// Extract `choices[0].message.content`
pub(crate) fn parse_completion(response: &Value) -> RagResult<String> {
    response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            RagError::GenerationFailed(format!(
                "unexpected response format: {}",
                truncate(&response.to_string(), 200)
            ))
        })
}

impl Generator for ApiGenerator {
    fn generate(&self, ctx: &RequestContext, prompt: &str) -> RagResult<String> {
        let response = self
            .endpoint
            .post(ctx, &self.request_body(prompt))
            .map_err(|e| {
                warn!(target: "ragline::llm_client", op = "generate", error = %e, "Generation request failed");
                e.into_rag_error(RagError::GenerationFailed)
            })?;
        parse_completion(&response)
    }
}
