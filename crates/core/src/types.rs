//! Data model for documents, records, collection schemas and search results
//!
//! Records keep their required fields typed (`id`, `vector`, `text`) and put
//! everything else in an opaque extension map, so dynamic metadata survives a
//! round trip through the store without weakening validation of the fields
//! every collection needs.

use crate::error::{RagError, RagResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Primary key of a document / record
pub type DocId = i64;

/// Dynamic metadata attached to documents and returned with hits
pub type Metadata = serde_json::Map<String, JsonValue>;

/// Default bound on the text field, in bytes
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 512;

/// Maximum collection name length
pub const MAX_COLLECTION_NAME_LENGTH: usize = 256;

// ============================================================================
// SimilarityMetric
// ============================================================================

/// Similarity metric for a collection
///
/// All metrics are normalized to "higher = more similar" when reported as a
/// hit score, so one total order (score desc, id asc) covers every metric:
///
/// | Metric | Score |
/// |--------|-------|
/// | `Cosine` | `dot(a,b) / (‖a‖·‖b‖)`, range [-1, 1] (1 − cosine distance) |
/// | `L2` | `1 / (1 + ‖a − b‖)`, range (0, 1] |
/// | `Ip` | `dot(a,b)`, unbounded |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Cosine similarity
    #[default]
    Cosine,
    /// Euclidean distance, reported as `1 / (1 + distance)`
    #[serde(alias = "euclidean")]
    L2,
    /// Inner (dot) product
    #[serde(alias = "inner_product", alias = "dot_product")]
    Ip,
}

impl SimilarityMetric {
    /// Human-readable name for display
    pub fn name(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::L2 => "l2",
            SimilarityMetric::Ip => "ip",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Some(SimilarityMetric::Cosine),
            "l2" | "euclidean" => Some(SimilarityMetric::L2),
            "ip" | "inner_product" | "dot_product" | "dot" => Some(SimilarityMetric::Ip),
            _ => None,
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// CollectionSchema
// ============================================================================

/// Shape of one collection - immutable after creation
///
/// Changing any field requires dropping and recreating the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Collection name
    pub name: String,
    /// Name of the int64 primary key field
    pub primary_key_field: String,
    /// Name of the float vector field
    pub vector_field: String,
    /// Embedding dimension. Must be > 0.
    pub vector_dim: usize,
    /// Name of the text field
    pub text_field: String,
    /// Upper bound on the text field, in bytes
    pub max_text_length: usize,
    /// Whether records may carry fields beyond id/vector/text
    pub dynamic_fields_enabled: bool,
    /// Metric the vector index is built with
    pub similarity_metric: SimilarityMetric,
}

impl CollectionSchema {
    /// Schema with the conventional field names (`id`, `vector`, `text`),
    /// a 512-byte text bound and dynamic fields enabled.
    pub fn new(name: impl Into<String>, vector_dim: usize, metric: SimilarityMetric) -> Self {
        CollectionSchema {
            name: name.into(),
            primary_key_field: "id".to_string(),
            vector_field: "vector".to_string(),
            vector_dim,
            text_field: "text".to_string(),
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            dynamic_fields_enabled: true,
            similarity_metric: metric,
        }
    }

    /// Override the three fixed field names
    pub fn with_fields(
        mut self,
        primary_key: impl Into<String>,
        vector: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.primary_key_field = primary_key.into();
        self.vector_field = vector.into();
        self.text_field = text.into();
        self
    }

    /// Override the text bound
    pub fn with_max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    /// Enable or disable dynamic fields
    pub fn with_dynamic_fields(mut self, enabled: bool) -> Self {
        self.dynamic_fields_enabled = enabled;
        self
    }

    /// Validate the schema before it is used to create a collection
    pub fn validate(&self) -> RagResult<()> {
        validate_collection_name(&self.name)?;

        if self.vector_dim == 0 {
            return Err(RagError::invalid_input(format!(
                "Invalid dimension: {} (must be > 0)",
                self.vector_dim
            )));
        }
        if self.max_text_length == 0 {
            return Err(RagError::invalid_input("max_text_length must be > 0"));
        }

        let fields = [
            &self.primary_key_field,
            &self.vector_field,
            &self.text_field,
        ];
        if fields.iter().any(|f| f.is_empty()) {
            return Err(RagError::invalid_input("field names cannot be empty"));
        }
        if fields[0] == fields[1] || fields[0] == fields[2] || fields[1] == fields[2] {
            return Err(RagError::invalid_input(format!(
                "field names must be distinct: {}, {}, {}",
                fields[0], fields[1], fields[2]
            )));
        }
        Ok(())
    }

    /// Whether `key` names one of the fixed fields
    pub fn is_fixed_field(&self, key: &str) -> bool {
        key == self.primary_key_field || key == self.vector_field || key == self.text_field
    }

    /// Compare against an existing collection's schema
    ///
    /// Returns a `SchemaConflict` naming the first field that differs, so a
    /// silent mismatch between the requested and stored shape cannot slip by.
    pub fn check_compatible(&self, existing: &CollectionSchema) -> RagResult<()> {
        let conflict = |field: &str, existing: String, requested: String| {
            Err(RagError::SchemaConflict {
                collection: self.name.clone(),
                field: field.to_string(),
                existing,
                requested,
            })
        };

        if existing.vector_dim != self.vector_dim {
            return conflict(
                "vector_dim",
                existing.vector_dim.to_string(),
                self.vector_dim.to_string(),
            );
        }
        if existing.similarity_metric != self.similarity_metric {
            return conflict(
                "similarity_metric",
                existing.similarity_metric.to_string(),
                self.similarity_metric.to_string(),
            );
        }
        if existing.primary_key_field != self.primary_key_field {
            return conflict(
                "primary_key_field",
                existing.primary_key_field.clone(),
                self.primary_key_field.clone(),
            );
        }
        if existing.vector_field != self.vector_field {
            return conflict(
                "vector_field",
                existing.vector_field.clone(),
                self.vector_field.clone(),
            );
        }
        if existing.text_field != self.text_field {
            return conflict(
                "text_field",
                existing.text_field.clone(),
                self.text_field.clone(),
            );
        }
        if existing.max_text_length != self.max_text_length {
            return conflict(
                "max_text_length",
                existing.max_text_length.to_string(),
                self.max_text_length.to_string(),
            );
        }
        if existing.dynamic_fields_enabled != self.dynamic_fields_enabled {
            return conflict(
                "dynamic_fields_enabled",
                existing.dynamic_fields_enabled.to_string(),
                self.dynamic_fields_enabled.to_string(),
            );
        }
        Ok(())
    }

    /// Validate one record against this schema
    ///
    /// Checks the vector length, the text bound, and the dynamic-field policy.
    pub fn check_record(&self, record: &Record) -> RagResult<()> {
        if record.vector.len() != self.vector_dim {
            return Err(RagError::DimensionMismatch {
                expected: self.vector_dim,
                got: record.vector.len(),
            });
        }
        if record.text.len() > self.max_text_length {
            return Err(RagError::invalid_input(format!(
                "record {}: text is {} bytes, limit is {}",
                record.id,
                record.text.len(),
                self.max_text_length
            )));
        }
        if !record.extra.is_empty() && !self.dynamic_fields_enabled {
            return Err(RagError::invalid_input(format!(
                "record {}: dynamic fields are disabled on collection '{}'",
                record.id, self.name
            )));
        }
        if let Some(key) = record.extra.keys().find(|k| self.is_fixed_field(k)) {
            return Err(RagError::invalid_input(format!(
                "record {}: metadata key '{}' collides with a schema field",
                record.id, key
            )));
        }
        Ok(())
    }
}

/// Validate a collection name
///
/// # Validation Rules
/// - Cannot be empty
/// - Cannot exceed 256 characters
/// - Cannot contain '/' or null bytes
/// - Cannot start with '_' (reserved for system use)
pub fn validate_collection_name(name: &str) -> RagResult<()> {
    let invalid = |reason: &str| {
        Err(RagError::InvalidCollectionName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return invalid("Collection name cannot be empty");
    }
    if name.len() > MAX_COLLECTION_NAME_LENGTH {
        return invalid("Collection name cannot exceed 256 characters");
    }
    if name.contains('/') {
        return invalid("Collection name cannot contain '/'");
    }
    if name.contains('\0') {
        return invalid("Collection name cannot contain null bytes");
    }
    if name.starts_with('_') {
        return invalid("Collection names starting with '_' are reserved");
    }
    Ok(())
}

// ============================================================================
// Documents and records
// ============================================================================

/// Caller-supplied unit of knowledge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Primary key the record will be stored under
    pub id: DocId,
    /// Text that gets embedded and returned as context
    pub text: String,
    /// Arbitrary metadata, stored as dynamic fields
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document without metadata
    pub fn new(id: DocId, text: impl Into<String>) -> Self {
        Document {
            id,
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Attach one metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Persisted unit inside a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Primary key
    pub id: DocId,
    /// Embedding; length must equal the collection dimension
    pub vector: Vec<f32>,
    /// Bounded text field
    pub text: String,
    /// Dynamic fields
    #[serde(default)]
    pub extra: Metadata,
}

impl Record {
    /// Assemble a record from a document and its embedding
    pub fn from_document(doc: Document, vector: Vec<f32>) -> Self {
        Record {
            id: doc.id,
            vector,
            text: doc.text,
            extra: doc.metadata,
        }
    }

    /// Get the embedding dimension
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

// ============================================================================
// Search
// ============================================================================

/// Similarity search input
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    /// Query embedding
    pub query_vector: Vec<f32>,
    /// Maximum number of hits (must be > 0)
    pub limit: usize,
    /// Minimum score a hit must reach, if set
    pub score_threshold: Option<f64>,
}

impl RetrievalRequest {
    /// Create a request without a threshold
    pub fn new(query_vector: Vec<f32>, limit: usize) -> Self {
        RetrievalRequest {
            query_vector,
            limit,
            score_threshold: None,
        }
    }

    /// Builder: set the score threshold
    pub fn with_threshold(mut self, threshold: Option<f64>) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Reject a zero limit and a non-finite threshold
    pub fn validate(&self) -> RagResult<()> {
        if self.limit == 0 {
            return Err(RagError::invalid_input("limit must be > 0"));
        }
        if let Some(t) = self.score_threshold {
            if !t.is_finite() {
                return Err(RagError::invalid_input(format!(
                    "score threshold must be finite, got {}",
                    t
                )));
            }
        }
        Ok(())
    }

    /// Whether a score passes the threshold (NaN never does)
    pub fn accepts(&self, score: f64) -> bool {
        if score.is_nan() {
            return false;
        }
        self.score_threshold.map_or(true, |t| score >= t)
    }
}

/// Search result entry
///
/// Score is always "higher = more similar" regardless of the metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Primary key of the matched record
    pub id: DocId,
    /// Similarity score
    pub score: f64,
    /// Text field of the matched record
    pub text: String,
    /// Dynamic fields of the matched record
    #[serde(default)]
    pub metadata: Metadata,
}

/// Collection metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Immutable schema
    pub schema: CollectionSchema,
    /// Current record count
    pub count: usize,
    /// Whether the collection is query-ready
    pub loaded: bool,
}
