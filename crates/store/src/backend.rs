//! Vector store trait
//!
//! The seam between `VectorCollection` and whatever actually holds the
//! vectors. Implementations:
//! - `InMemoryVectorStore` (brute-force, deterministic, in-process)
//! - `MilvusRestStore` (Milvus v2 REST API)
//!
//! Each method is one request/response round trip and must be atomic from
//! the caller's point of view: a concurrent `search` sees a record either
//! before or after an `upsert`, never half-written.

use ragline_core::{
    CollectionInfo, CollectionSchema, DocId, RagResult, Record, RequestContext, RetrievalRequest,
    SearchHit,
};

/// Result of a conditional collection create
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// This call created the collection
    Created,
    /// The collection already existed with this schema
    Existing(CollectionSchema),
}

/// Trait for vector store implementations
///
/// The trait is object-safe for use as `Arc<dyn VectorStore>`.
pub trait VectorStore: Send + Sync {
    /// Short name for logs
    fn kind(&self) -> &'static str;

    /// Describe a collection, or `None` if it does not exist
    fn describe_collection(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> RagResult<Option<CollectionInfo>>;

    /// Names of all collections, sorted
    fn list_collections(&self, ctx: &RequestContext) -> RagResult<Vec<String>>;

    /// Create the collection unless one with the same name exists
    ///
    /// Concurrent calls with the same name must yield exactly one `Created`.
    fn create_collection_if_absent(
        &self,
        ctx: &RequestContext,
        schema: &CollectionSchema,
    ) -> RagResult<CreateOutcome>;

    /// Make a collection query-ready
    fn load_collection(&self, ctx: &RequestContext, name: &str) -> RagResult<()>;

    /// Drop a collection and all its records
    ///
    /// Returns true if the collection existed.
    fn drop_collection(&self, ctx: &RequestContext, name: &str) -> RagResult<bool>;

    /// Insert or replace records by primary key
    fn upsert(&self, ctx: &RequestContext, name: &str, records: Vec<Record>) -> RagResult<()>;

    /// Remove records by primary key; absent ids are ignored
    fn delete(&self, ctx: &RequestContext, name: &str, ids: &[DocId]) -> RagResult<()>;

    /// Top-k similarity search
    ///
    /// Scores must be "higher = more similar".
    fn search(
        &self,
        ctx: &RequestContext,
        name: &str,
        request: &RetrievalRequest,
    ) -> RagResult<Vec<SearchHit>>;

    /// Fetch records by primary key, ascending; absent ids are skipped
    fn get(&self, ctx: &RequestContext, name: &str, ids: &[DocId]) -> RagResult<Vec<Record>>;
}
