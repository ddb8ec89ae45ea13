//! API-based embedder using an OpenAI-compatible endpoint
//!
//! Calls `{endpoint}/embeddings` with `{"model", "input": [...]}` and reads
//! `data[i].embedding`, reordered by `data[i].index`.

use ragline_core::{ModelConfig, RagError, RagResult, RequestContext};
use serde_json::Value;
use tracing::warn;

use super::EmbeddingClient;
use crate::llm_client::{truncate, Endpoint};

/// Embedder that calls an OpenAI-compatible embeddings endpoint.
///
/// Works with OpenAI, Ollama, vLLM, llama.cpp server and other compatible
/// providers.
#[derive(Debug, Clone)]
pub struct ApiEmbedder {
    endpoint: Endpoint,
    /// Requested output dimension, for providers that support truncation
    dimensions: Option<usize>,
}

impl ApiEmbedder {
    /// Create a new ApiEmbedder.
    ///
    /// `endpoint` should be the base URL (e.g. "https://api.openai.com/v1").
    /// The `/embeddings` path is appended automatically.
    pub fn new(endpoint: &str, model: &str, api_key: Option<&str>, timeout_ms: u64) -> Self {
        ApiEmbedder {
            endpoint: Endpoint::new(endpoint, "embeddings", model, api_key, timeout_ms),
            dimensions: None,
        }
    }

    /// Create from an `[embedding]` config section
    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(
            &config.endpoint,
            &config.model,
            config.api_key.as_deref(),
            config.timeout_ms,
        )
    }

    /// Ask the provider for vectors of this length
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    fn request_body(&self, texts: &[&str]) -> Value {
        let mut body = serde_json::json!({
            "model": self.endpoint.model,
            "input": texts,
        });
        if let Some(d) = self.dimensions {
            body["dimensions"] = Value::from(d);
        }
        body
    }
}

/// Pull the vectors out of an embeddings response, in request order
pub(crate) fn parse_embeddings(response: &Value, expected: usize) -> RagResult<Vec<Vec<f32>>> {
    let unavailable = |msg: String| RagError::EmbeddingUnavailable(msg);

    let data = response
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            unavailable(format!(
                "unexpected response format: {}",
                truncate(&response.to_string(), 200)
            ))
        })?;

    if data.len() != expected {
        return Err(unavailable(format!(
            "requested {} embeddings, provider returned {}",
            expected,
            data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(Value::as_u64)
            .map(|i| i as usize)
            .unwrap_or(position);
        let vector: Vec<f32> = item
            .get("embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| unavailable(format!("item {} has no embedding", position)))?
            .iter()
            .map(|x| {
                x.as_f64()
                    .map(|x| x as f32)
                    .ok_or_else(|| unavailable(format!("item {} has a non-numeric component", position)))
            })
            .collect::<RagResult<_>>()?;

        match slots.get_mut(index) {
            Some(slot) if slot.is_none() => *slot = Some(vector),
            _ => {
                return Err(unavailable(format!(
                    "embedding index {} is out of range or repeated",
                    index
                )))
            }
        }
    }

    // Every slot is filled: `expected` distinct in-range indices were seen
    Ok(slots.into_iter().flatten().collect())
}

impl EmbeddingClient for ApiEmbedder {
    fn embed(&self, ctx: &RequestContext, text: &str) -> RagResult<Vec<f32>> {
        let mut vectors = self.embed_batch(ctx, &[text])?;
        vectors
            .pop()
            .ok_or_else(|| RagError::EmbeddingUnavailable("empty embeddings response".to_string()))
    }

    fn embed_batch(&self, ctx: &RequestContext, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .endpoint
            .post(ctx, &self.request_body(texts))
            .map_err(|e| {
                warn!(target: "ragline::llm_client", op = "embed", error = %e, "Embedding request failed");
                e.into_rag_error(RagError::EmbeddingUnavailable)
            })?;
        parse_embeddings(&response, texts.len())
    }
}
