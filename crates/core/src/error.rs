//! Error types for ragline
//!
//! A single taxonomy is shared by the store, the embedding and generation
//! clients, and the indexing/retrieval pipeline. We use `thiserror` for the
//! `Display` and `Error` implementations.

use crate::types::DocId;
use thiserror::Error;

/// Result type alias for ragline operations
pub type RagResult<T> = std::result::Result<T, RagError>;

/// Errors produced by ragline components
#[derive(Debug, Error)]
pub enum RagError {
    /// A collection with the requested name exists with an incompatible shape
    #[error(
        "Schema conflict on collection '{collection}': {field} is {existing}, requested {requested}"
    )]
    SchemaConflict {
        /// Collection name
        collection: String,
        /// The schema field that differs
        field: String,
        /// Value stored in the existing collection
        existing: String,
        /// Value in the requested schema
        requested: String,
    },

    /// Vector length disagrees with the collection dimension
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension from the collection schema
        expected: usize,
        /// Length of the provided vector
        got: usize,
    },

    /// Collection with the given name does not exist
    #[error("Collection not found: {name}")]
    CollectionNotFound {
        /// Collection name
        name: String,
    },

    /// Collection exists but has not been loaded for querying
    #[error("Collection not loaded: {name}")]
    CollectionNotLoaded {
        /// Collection name
        name: String,
    },

    /// Collection name is invalid
    #[error("Invalid collection name: {name} ({reason})")]
    InvalidCollectionName {
        /// The invalid name
        name: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// Caller supplied an invalid argument
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the problem
        message: String,
    },

    /// The vector store could not be reached or rejected the request
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The embedding provider failed
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The generation collaborator failed
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// The request context was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// The request context deadline passed
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// A multi-chunk upsert stopped after some chunks were committed
    #[error(
        "Indexing interrupted after {} of {} records: {source}",
        .upserted.len(),
        .upserted.len() + .remaining.len()
    )]
    PartialIndex {
        /// Primary keys committed before the interruption
        upserted: Vec<DocId>,
        /// Primary keys that were not committed
        remaining: Vec<DocId>,
        /// Documents rejected before the upsert, with the reason
        skipped: Vec<(DocId, String)>,
        /// What stopped the operation
        source: Box<RagError>,
    },

    /// Configuration could not be read, parsed or validated
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Build an `InvalidInput` error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        RagError::InvalidInput {
            message: message.into(),
        }
    }

    /// Infrastructure failures where a caller-level retry with backoff is reasonable
    pub fn is_transient(&self) -> bool {
        match self {
            RagError::StoreUnavailable(_)
            | RagError::EmbeddingUnavailable(_)
            | RagError::DeadlineExceeded => true,
            RagError::PartialIndex { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Check if this error is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            RagError::DimensionMismatch { .. }
                | RagError::InvalidCollectionName { .. }
                | RagError::InvalidInput { .. }
                | RagError::SchemaConflict { .. }
        )
    }

    /// Check if this error came from the request context
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RagError::Cancelled | RagError::DeadlineExceeded)
    }
}
