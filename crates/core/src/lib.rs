//! Core types for ragline
//!
//! This crate defines the foundational types shared by the store and the
//! intelligence layer:
//! - Document / Record: caller input and the persisted vector-store unit
//! - CollectionSchema: immutable shape of one collection
//! - SimilarityMetric: cosine, L2 and inner product, normalized to "higher = better"
//! - RetrievalRequest / SearchHit: similarity search in and out
//! - RagError: error taxonomy for every layer
//! - RequestContext: cancellation flag and deadline carried by every call
//! - RaglineConfig: `ragline.toml` configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod error;
pub mod types;

pub use config::{
    IndexConfig, ModelConfig, RaglineConfig, RetrievalConfig, StoreConfig, CONFIG_FILE_NAME,
};
pub use context::RequestContext;
pub use error::{RagError, RagResult};
pub use types::{
    validate_collection_name, CollectionInfo, CollectionSchema, DocId, Document, Metadata, Record,
    RetrievalRequest, SearchHit, SimilarityMetric, DEFAULT_MAX_TEXT_LENGTH,
    MAX_COLLECTION_NAME_LENGTH,
};
