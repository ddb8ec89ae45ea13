//! Shared HTTP client for OpenAI-compatible endpoints
//!
//! `ApiEmbedder` and `ApiGenerator` both post JSON to a base URL with an
//! optional bearer token. The transport lives here so the two clients only
//! build request bodies and pick fields out of the response.

use std::fmt;
use std::time::Duration;

use ragline_core::{RagError, RequestContext};

// ============================================================================
// Unified Error Type
// ============================================================================

/// Errors that can occur when calling an external model endpoint
#[derive(Debug)]
pub enum LlmClientError {
    /// HTTP request failed (network unreachable, connection refused, etc.)
    Network(String),
    /// Failed to parse model response
    Parse(String),
    /// Model request timed out
    Timeout,
    /// The request context was cancelled or expired before sending
    Interrupted(RagError),
    /// Required cargo feature is not enabled
    FeatureDisabled(&'static str),
}

impl fmt::Display for LlmClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmClientError::Network(msg) => write!(f, "network error: {}", msg),
            LlmClientError::Parse(msg) => write!(f, "parse error: {}", msg),
            LlmClientError::Timeout => write!(f, "model request timed out"),
            LlmClientError::Interrupted(e) => write!(f, "{}", e),
            LlmClientError::FeatureDisabled(feat) => {
                write!(f, "feature '{}' not enabled", feat)
            }
        }
    }
}

impl std::error::Error for LlmClientError {}

impl LlmClientError {
    /// Map into the shared taxonomy, using `wrap` for provider failures
    ///
    /// Timeouts and context interruptions keep their own variants so callers
    /// can tell a slow provider from a broken one.
    pub fn into_rag_error(self, wrap: impl FnOnce(String) -> RagError) -> RagError {
        match self {
            LlmClientError::Timeout => RagError::DeadlineExceeded,
            LlmClientError::Interrupted(e) => e,
            LlmClientError::FeatureDisabled(_) => RagError::Config(self.to_string()),
            other => wrap(other.to_string()),
        }
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Resolved endpoint: full URL, model name, credentials and timeout
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Full URL to post to
    pub url: String,
    /// Model name to request
    pub model: String,
    /// Optional bearer token
    pub api_key: Option<String>,
    /// Per-request timeout, clamped to the context deadline
    pub timeout: Duration,
}

impl Endpoint {
    /// Join `base` and `path`, dropping a trailing slash from `base`
    pub fn new(base: &str, path: &str, model: &str, api_key: Option<&str>, timeout_ms: u64) -> Self {
        Endpoint {
            url: format!("{}/{}", base.trim_end_matches('/'), path),
            model: model.to_string(),
            api_key: api_key.map(|s| s.to_string()),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Post `body` and parse the JSON response
    pub fn post(
        &self,
        ctx: &RequestContext,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmClientError> {
        let timeout = ctx
            .clamp_timeout(self.timeout)
            .map_err(LlmClientError::Interrupted)?;
        let text = post_json(&self.url, self.api_key.as_deref(), timeout, body)?;
        serde_json::from_str(&text).map_err(|e| {
            LlmClientError::Parse(format!(
                "invalid JSON response: {} ({})",
                e,
                truncate(&text, 200)
            ))
        })
    }
}

pub(crate) fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ============================================================================
// Transport
// ============================================================================

#[cfg(feature = "http")]
fn post_json(
    url: &str,
    api_key: Option<&str>,
    timeout: Duration,
    body: &serde_json::Value,
) -> Result<String, LlmClientError> {
    let body_bytes = serde_json::to_vec(body)
        .map_err(|e| LlmClientError::Parse(format!("failed to serialize request: {}", e)))?;

    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let mut request = agent.post(url).header("Content-Type", "application/json");

    if let Some(key) = api_key {
        request = request.header("Authorization", &format!("Bearer {}", key));
    }

    let mut response = request.send(&body_bytes[..]).map_err(|e| {
        let msg = e.to_string();
        if msg.contains("timed out") || msg.contains("Timeout") {
            LlmClientError::Timeout
        } else {
            LlmClientError::Network(msg)
        }
    })?;

    response
        .body_mut()
        .read_to_string()
        .map_err(|e| LlmClientError::Network(format!("failed to read response: {}", e)))
}

/// Placeholder for when the `http` feature is not enabled.
#[cfg(not(feature = "http"))]
fn post_json(
    _url: &str,
    _api_key: Option<&str>,
    _timeout: Duration,
    _body: &serde_json::Value,
) -> Result<String, LlmClientError> {
    Err(LlmClientError::FeatureDisabled("http"))
}
