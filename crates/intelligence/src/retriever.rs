//! Retriever: query text in, ranked hits out
//!
//! Stateless; share one across threads.

use std::sync::Arc;

use tracing::debug;

use ragline_core::{RagError, RagResult, RequestContext, RetrievalRequest, SearchHit};
use ragline_store::VectorCollection;

use crate::embed::EmbeddingClient;

/// Embeds a query and searches one collection
pub struct Retriever {
    embedder: Arc<dyn EmbeddingClient>,
    collection: Arc<VectorCollection>,
}

impl Retriever {
    /// Create a retriever over `collection`
    pub fn new(embedder: Arc<dyn EmbeddingClient>, collection: Arc<VectorCollection>) -> Self {
        Retriever {
            embedder,
            collection,
        }
    }

    /// Up to `limit` hits for `query`, best first, each scoring at least
    /// `score_threshold` when one is given
    ///
    /// The arguments are checked before the embedding call, so a bad limit
    /// or an empty query costs no provider round trip.
    pub fn retrieve(
        &self,
        ctx: &RequestContext,
        query: &str,
        limit: usize,
        score_threshold: Option<f64>,
    ) -> RagResult<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(RagError::invalid_input("query must not be empty"));
        }
        // Validate limit/threshold up front with a placeholder vector
        RetrievalRequest::new(Vec::new(), limit)
            .with_threshold(score_threshold)
            .validate()?;

        let query_vector = self.embedder.embed(ctx, query)?;
        let request = RetrievalRequest::new(query_vector, limit).with_threshold(score_threshold);
        let hits = self.collection.search(ctx, &request)?;

        debug!(
            target: "ragline::retrieve",
            collection = self.collection.name(),
            limit,
            results = hits.len(),
            "Query retrieved"
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, HashingEmbedder};
    use ragline_core::{CollectionSchema, Metadata, Record, SimilarityMetric};
    use ragline_store::{InMemoryVectorStore, VectorStore};

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    fn setup(embedder: Arc<dyn EmbeddingClient>) -> Retriever {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let collection = Arc::new(
            VectorCollection::new(store, CollectionSchema::new("docs", 32, SimilarityMetric::Cosine))
                .unwrap(),
        );
        collection.ensure(&ctx()).unwrap();

        let hashing = HashingEmbedder::new(32);
        let records = ["red apple", "green apple", "blue car"]
            .iter()
            .enumerate()
            .map(|(i, text)| Record {
                id: i as i64 + 1,
                vector: hashing.embed(&ctx(), text).unwrap(),
                text: text.to_string(),
                extra: Metadata::new(),
            })
            .collect();
        collection.upsert(&ctx(), records).unwrap();
        Retriever::new(embedder, collection)
    }

    #[test]
    fn test_retrieve_respects_limit() {
        let r = setup(Arc::new(HashingEmbedder::new(32)));
        let hits = r.retrieve(&ctx(), "apple", 2, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_exact_text_ranks_first() {
        let r = setup(Arc::new(HashingEmbedder::new(32)));
        let hits = r.retrieve(&ctx(), "blue car", 3, None).unwrap();
        assert_eq!(hits[0].id, 3);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_filters() {
        let r = setup(Arc::new(HashingEmbedder::new(32)));
        let hits = r.retrieve(&ctx(), "blue car", 3, Some(0.999)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "blue car");
    }

    #[test]
    fn test_invalid_arguments_skip_embedding() {
        // FailingEmbedder would turn any embedding call into EmbeddingUnavailable
        let r = setup(Arc::new(FailingEmbedder));
        assert!(matches!(
            r.retrieve(&ctx(), "   ", 2, None),
            Err(RagError::InvalidInput { .. })
        ));
        assert!(matches!(
            r.retrieve(&ctx(), "apple", 0, None),
            Err(RagError::InvalidInput { .. })
        ));
        assert!(matches!(
            r.retrieve(&ctx(), "apple", 2, Some(f64::INFINITY)),
            Err(RagError::InvalidInput { .. })
        ));
        assert!(matches!(
            r.retrieve(&ctx(), "apple", 2, None),
            Err(RagError::EmbeddingUnavailable(_))
        ));
    }
}
