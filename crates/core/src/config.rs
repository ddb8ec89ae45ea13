//! Configuration via `ragline.toml`
//!
//! One file describes the vector store connection, the collection schema,
//! the embedding and generation endpoints, and retrieval/indexing knobs.
//! Every field has a default, so an empty file is a valid configuration.

use crate::error::{RagError, RagResult};
use crate::types::{CollectionSchema, SimilarityMetric, DEFAULT_MAX_TEXT_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "ragline.toml";

/// Configuration for an OpenAI-compatible model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// API base URL (e.g. "http://localhost:11434/v1")
    pub endpoint: String,
    /// Model name (e.g. "text-embedding-3-small")
    pub model: String,
    /// Optional API key for authenticated endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Request timeout in milliseconds (default: 5000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Vector store connection and collection shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Store address. `"memory"` selects the in-process store.
    pub address: String,
    /// Collection name
    pub collection: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Similarity metric
    pub metric: SimilarityMetric,
    /// Primary key field name
    pub id_field: String,
    /// Vector field name
    pub vector_field: String,
    /// Text field name
    pub text_field: String,
    /// Text bound in bytes
    pub max_text_length: usize,
    /// Allow dynamic metadata fields
    pub dynamic_fields: bool,
    /// Store request timeout in milliseconds
    pub timeout_ms: u64,
    /// Bearer token for the store, if it requires one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            address: "memory".to_string(),
            collection: "documents".to_string(),
            dimension: 1536,
            metric: SimilarityMetric::Cosine,
            id_field: "id".to_string(),
            vector_field: "vector".to_string(),
            text_field: "text".to_string(),
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            dynamic_fields: true,
            timeout_ms: default_timeout_ms(),
            token: None,
        }
    }
}

/// Retrieval knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of hits fed into the prompt
    pub top_k: usize,
    /// Minimum score for a hit to be used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f64>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            top_k: 2,
            score_threshold: None,
        }
    }
}

/// Indexing knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Texts per embedding request
    pub embed_batch_size: usize,
    /// Records per upsert call. Unset means one upsert per `index` call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upsert_batch_size: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            embed_batch_size: 64,
            upsert_batch_size: None,
        }
    }
}

/// Configuration loaded from `ragline.toml`.
///
/// # Example
///
/// ```toml
/// [store]
/// collection = "products"
/// dimension = 1536
/// metric = "cosine"
///
/// [embedding]
/// endpoint = "https://api.openai.com/v1"
/// model = "text-embedding-3-small"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RaglineConfig {
    /// Vector store section
    #[serde(default)]
    pub store: StoreConfig,
    /// Embedding endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<ModelConfig>,
    /// Generation endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<ModelConfig>,
    /// Retrieval section
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Indexing section
    #[serde(default)]
    pub index: IndexConfig,
}

impl RaglineConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Ragline configuration

[store]
# "memory" keeps the collection in-process; anything else is a store URL
# (e.g. "http://127.0.0.1:19530" for Milvus, requires the "milvus" feature).
address = "memory"
collection = "documents"
dimension = 1536
# "cosine" (default), "l2" or "ip"
metric = "cosine"
id_field = "id"
vector_field = "vector"
text_field = "text"
max_text_length = 512
dynamic_fields = true
timeout_ms = 5000
# token = "root:Milvus"

[retrieval]
top_k = 2
# score_threshold = 0.3

[index]
embed_batch_size = 64
# upsert_batch_size = 500

# [embedding]
# endpoint = "https://api.openai.com/v1"
# model = "text-embedding-3-small"
# api_key = "your-api-key"      # optional
# timeout_ms = 5000              # optional, default 5000

# [generation]
# endpoint = "https://api.openai.com/v1"
# model = "gpt-4o"
"#
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(content: &str) -> RagResult<Self> {
        let config: RaglineConfig = toml::from_str(content)
            .map_err(|e| RagError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> RagResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RagError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            RagError::Config(msg) => RagError::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> RagResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                RagError::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> RagResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RagError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            RagError::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> RagResult<()> {
        self.to_schema()
            .validate()
            .map_err(|e| RagError::Config(format!("[store] {}", e)))?;
        if self.retrieval.top_k == 0 {
            return Err(RagError::Config("[retrieval] top_k must be > 0".into()));
        }
        if let Some(t) = self.retrieval.score_threshold {
            if !t.is_finite() {
                return Err(RagError::Config(
                    "[retrieval] score_threshold must be finite".into(),
                ));
            }
        }
        if self.index.embed_batch_size == 0 {
            return Err(RagError::Config(
                "[index] embed_batch_size must be > 0".into(),
            ));
        }
        if self.index.upsert_batch_size == Some(0) {
            return Err(RagError::Config(
                "[index] upsert_batch_size must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Collection schema described by the `[store]` section.
    pub fn to_schema(&self) -> CollectionSchema {
        let s = &self.store;
        CollectionSchema::new(s.collection.clone(), s.dimension, s.metric)
            .with_fields(
                s.id_field.clone(),
                s.vector_field.clone(),
                s.text_field.clone(),
            )
            .with_max_text_length(s.max_text_length)
            .with_dynamic_fields(s.dynamic_fields)
    }
}
