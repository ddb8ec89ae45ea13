//! Deterministic collaborators for tests, demos and benchmarks
//!
//! Nothing here touches the network, so a whole flow can run in-process:
//!
//! ```
//! use std::sync::Arc;
//! use ragline_core::{CollectionSchema, Document, RequestContext, SimilarityMetric};
//! use ragline_intelligence::testing::{EchoGenerator, HashingEmbedder};
//! use ragline_intelligence::RagFlow;
//! use ragline_store::{InMemoryVectorStore, VectorCollection};
//!
//! let ctx = RequestContext::background();
//! let collection = Arc::new(VectorCollection::new(
//!     Arc::new(InMemoryVectorStore::new()),
//!     CollectionSchema::new("products", 64, SimilarityMetric::Cosine),
//! )?);
//! collection.ensure(&ctx)?;
//!
//! let flow = RagFlow::new(Arc::new(HashingEmbedder::new(64)), collection, Arc::new(EchoGenerator));
//! flow.stage(vec![Document::new(1, "iPhone 17 $1000")]);
//! let prompt = flow.answer(&ctx, "iphone")?;
//! assert!(prompt.contains("iPhone 17 $1000"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ragline_core::{
    CollectionInfo, CollectionSchema, DocId, RagError, RagResult, Record, RequestContext,
    RetrievalRequest, SearchHit,
};
use ragline_store::{CreateOutcome, VectorStore};

use crate::embed::EmbeddingClient;
use crate::generate::Generator;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Bag-of-words embedder using feature hashing
///
/// Lowercases the text, splits on anything that is not alphanumeric, and adds
/// 1.0 to bucket `fnv1a(token) % dimension` per token. Texts sharing words get
/// positive cosine similarity; identical texts get identical vectors.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of `dimension` (minimum 1)
    pub fn new(dimension: usize) -> Self {
        HashingEmbedder {
            dimension: dimension.max(1),
        }
    }

    /// Output dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed without a context; never fails
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lower = text.to_lowercase();
        for token in lower.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

impl EmbeddingClient for HashingEmbedder {
    fn embed(&self, ctx: &RequestContext, text: &str) -> RagResult<Vec<f32>> {
        ctx.check()?;
        Ok(self.vector(text))
    }
}

/// Embedder that always fails with `EmbeddingUnavailable`
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingEmbedder;

impl EmbeddingClient for FailingEmbedder {
    fn embed(&self, _ctx: &RequestContext, _text: &str) -> RagResult<Vec<f32>> {
        Err(RagError::EmbeddingUnavailable(
            "embedding provider unreachable".to_string(),
        ))
    }
}

/// Generator that returns the prompt unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoGenerator;

impl Generator for EchoGenerator {
    fn generate(&self, ctx: &RequestContext, prompt: &str) -> RagResult<String> {
        ctx.check()?;
        Ok(prompt.to_string())
    }
}

/// Generator that always fails with `GenerationFailed`
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingGenerator;

impl Generator for FailingGenerator {
    fn generate(&self, _ctx: &RequestContext, _prompt: &str) -> RagResult<String> {
        Err(RagError::GenerationFailed("model returned 500".to_string()))
    }
}

/// Store wrapper whose upserts start failing after a number of successes
///
/// Every other operation passes straight through to the wrapped store.
pub struct FlakyStore {
    inner: Arc<dyn VectorStore>,
    upserts_left: AtomicUsize,
}

impl FlakyStore {
    /// Allow `successful_upserts` upsert calls, then fail with `StoreUnavailable`
    pub fn new(inner: Arc<dyn VectorStore>, successful_upserts: usize) -> Self {
        FlakyStore {
            inner,
            upserts_left: AtomicUsize::new(successful_upserts),
        }
    }
}

impl VectorStore for FlakyStore {
    fn kind(&self) -> &'static str {
        "flaky"
    }

    fn describe_collection(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> RagResult<Option<CollectionInfo>> {
        self.inner.describe_collection(ctx, name)
    }

    fn list_collections(&self, ctx: &RequestContext) -> RagResult<Vec<String>> {
        self.inner.list_collections(ctx)
    }

    fn create_collection_if_absent(
        &self,
        ctx: &RequestContext,
        schema: &CollectionSchema,
    ) -> RagResult<CreateOutcome> {
        self.inner.create_collection_if_absent(ctx, schema)
    }

    fn load_collection(&self, ctx: &RequestContext, name: &str) -> RagResult<()> {
        self.inner.load_collection(ctx, name)
    }

    fn drop_collection(&self, ctx: &RequestContext, name: &str) -> RagResult<bool> {
        self.inner.drop_collection(ctx, name)
    }

    fn upsert(&self, ctx: &RequestContext, name: &str, records: Vec<Record>) -> RagResult<()> {
        let allowed = self
            .upserts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(RagError::StoreUnavailable("connection reset".to_string()));
        }
        self.inner.upsert(ctx, name, records)
    }

    fn delete(&self, ctx: &RequestContext, name: &str, ids: &[DocId]) -> RagResult<()> {
        self.inner.delete(ctx, name, ids)
    }

    fn search(
        &self,
        ctx: &RequestContext,
        name: &str,
        request: &RetrievalRequest,
    ) -> RagResult<Vec<SearchHit>> {
        self.inner.search(ctx, name, request)
    }

    fn get(&self, ctx: &RequestContext, name: &str, ids: &[DocId]) -> RagResult<Vec<Record>> {
        self.inner.get(ctx, name, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_embedder_is_deterministic() {
        let e = HashingEmbedder::new(32);
        assert_eq!(e.vector("Pixel 9 $800"), e.vector("pixel 9 800"));
        assert_eq!(e.vector("").iter().sum::<f32>(), 0.0);
        assert_eq!(e.vector("a b c").iter().sum::<f32>(), 3.0);
    }

    #[test]
    fn test_fnv1a_known_value() {
        assert_eq!(fnv1a(b""), FNV_OFFSET);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_failing_doubles() {
        let ctx = RequestContext::background();
        assert!(FailingEmbedder.embed(&ctx, "x").is_err());
        assert!(FailingGenerator.generate(&ctx, "x").is_err());
        assert_eq!(EchoGenerator.generate(&ctx, "x").unwrap(), "x");
    }
}
