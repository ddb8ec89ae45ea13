//! Ragline - retrieval-augmented generation over schema-bound vector collections
//!
//! Documents are embedded and upserted into a vector collection; a query is
//! embedded, the nearest records are retrieved with a deterministic ranking,
//! and their text becomes the context of a generation prompt.
//!
//! # Quick Start
//!
//! ```ignore
//! use ragline::{RaglineConfig, RequestContext, Document};
//!
//! let config = RaglineConfig::from_file(Path::new("ragline.toml"))?;
//! let ctx = RequestContext::background();
//! let flow = ragline::flow_from_config(&ctx, &config)?;
//!
//! flow.stage(vec![Document::new(1, "iPhone 17 $1000")]);
//! let answer = flow.answer(&ctx, "I want to buy an iphone")?;
//! ```
//!
//! # Architecture
//!
//! - `ragline-core`: data model, errors, request context, configuration
//! - `ragline-store`: the vector store seam, in-memory and Milvus stores, `VectorCollection`
//! - `ragline-intelligence`: embedding, generation, indexing, retrieval, `RagFlow`

use std::sync::Arc;

pub use ragline_core::*;
pub use ragline_intelligence::{
    build_context, testing, ApiEmbedder, ApiGenerator, EmbeddingClient, FlowAnswer, FlowError,
    FlowStage, Generator, IndexReport, Indexer, LlmClientError, PromptTemplate, RagFlow,
    Retriever, SkippedDocument, DEFAULT_TEMPLATE,
};
pub use ragline_store::{
    open_store, CreateOutcome, InMemoryVectorStore, MilvusRestStore, VectorCollection,
    VectorStore,
};

/// Open the configured store and ensure the configured collection exists
/// and is loaded
pub fn open_collection(
    ctx: &RequestContext,
    config: &RaglineConfig,
) -> RagResult<Arc<VectorCollection>> {
    let store = open_store(&config.store)?;
    let collection = VectorCollection::new(store, config.to_schema())?;
    collection.ensure(ctx)?;
    Ok(Arc::new(collection))
}

/// Build a flow whose embedder and generator come from the `[embedding]`
/// and `[generation]` sections
///
/// Both sections are required; a missing one is a `Config` error.
pub fn flow_from_config(ctx: &RequestContext, config: &RaglineConfig) -> RagResult<RagFlow> {
    let embedding = config
        .embedding
        .as_ref()
        .ok_or_else(|| RagError::Config("missing [embedding] section".to_string()))?;
    let generation = config
        .generation
        .as_ref()
        .ok_or_else(|| RagError::Config("missing [generation] section".to_string()))?;

    let embedder = ApiEmbedder::from_config(embedding).with_dimensions(config.store.dimension);
    let collection = open_collection(ctx, config)?;
    Ok(RagFlow::new(
        Arc::new(embedder),
        collection,
        Arc::new(ApiGenerator::from_config(generation)),
    )
    .with_retrieval(&config.retrieval)
    .with_index_config(&config.index))
}
