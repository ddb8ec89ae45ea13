//! In-process vector store
//!
//! Brute-force O(n) search over a `RecordHeap` per collection. Sufficient for
//! tests, demos and small corpora; results are fully deterministic.
//!
//! Collections live in a `DashMap` so creation is atomic per name. Each
//! collection sits behind its own `RwLock`: searches share it, while an
//! upsert or delete batch takes it exclusively so readers never observe a
//! half-applied batch.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use ragline_core::{
    CollectionInfo, CollectionSchema, DocId, RagError, RagResult, Record, RequestContext,
    RetrievalRequest, SearchHit,
};

use crate::backend::{CreateOutcome, VectorStore};
use crate::distance::compute_similarity;
use crate::heap::RecordHeap;
use crate::ranking::rank_hits;

struct CollectionState {
    schema: CollectionSchema,
    loaded: bool,
    heap: RecordHeap,
}

/// Brute-force in-memory implementation of [`VectorStore`]
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: DashMap<String, Arc<RwLock<CollectionState>>>,
}

impl InMemoryVectorStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, name: &str) -> RagResult<Arc<RwLock<CollectionState>>> {
        self.collections
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RagError::CollectionNotFound {
                name: name.to_string(),
            })
    }
}

impl VectorStore for InMemoryVectorStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn describe_collection(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> RagResult<Option<CollectionInfo>> {
        ctx.check()?;
        let Some(state) = self.collections.get(name).map(|e| Arc::clone(e.value())) else {
            return Ok(None);
        };
        let state = state.read();
        Ok(Some(CollectionInfo {
            schema: state.schema.clone(),
            count: state.heap.len(),
            loaded: state.loaded,
        }))
    }

    fn list_collections(&self, ctx: &RequestContext) -> RagResult<Vec<String>> {
        ctx.check()?;
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    fn create_collection_if_absent(
        &self,
        ctx: &RequestContext,
        schema: &CollectionSchema,
    ) -> RagResult<CreateOutcome> {
        ctx.check()?;
        schema.validate()?;

        match self.collections.entry(schema.name.clone()) {
            Entry::Occupied(existing) => {
                let state = existing.get().read();
                Ok(CreateOutcome::Existing(state.schema.clone()))
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(CollectionState {
                    schema: schema.clone(),
                    loaded: false,
                    heap: RecordHeap::new(schema.vector_dim),
                })));
                debug!(target: "ragline::store", collection = %schema.name, "In-memory collection created");
                Ok(CreateOutcome::Created)
            }
        }
    }

    fn load_collection(&self, ctx: &RequestContext, name: &str) -> RagResult<()> {
        ctx.check()?;
        self.collection(name)?.write().loaded = true;
        Ok(())
    }

    fn drop_collection(&self, ctx: &RequestContext, name: &str) -> RagResult<bool> {
        ctx.check()?;
        Ok(self.collections.remove(name).is_some())
    }

    fn upsert(&self, ctx: &RequestContext, name: &str, records: Vec<Record>) -> RagResult<()> {
        ctx.check()?;
        let state = self.collection(name)?;
        let mut state = state.write();

        // Validate the whole batch before touching the heap
        for record in &records {
            state.schema.check_record(record)?;
        }
        for record in records {
            state.heap.upsert(record);
        }
        Ok(())
    }

    fn delete(&self, ctx: &RequestContext, name: &str, ids: &[DocId]) -> RagResult<()> {
        ctx.check()?;
        let state = self.collection(name)?;
        let mut state = state.write();
        for &id in ids {
            state.heap.delete(id);
        }
        Ok(())
    }

    fn search(
        &self,
        ctx: &RequestContext,
        name: &str,
        request: &RetrievalRequest,
    ) -> RagResult<Vec<SearchHit>> {
        ctx.check()?;
        request.validate()?;
        let state = self.collection(name)?;
        let state = state.read();

        if !state.loaded {
            return Err(RagError::CollectionNotLoaded {
                name: name.to_string(),
            });
        }
        if request.query_vector.len() != state.schema.vector_dim {
            return Err(RagError::DimensionMismatch {
                expected: state.schema.vector_dim,
                got: request.query_vector.len(),
            });
        }

        let metric = state.schema.similarity_metric;

        // heap.iter() yields ascending ids, so scoring order is reproducible
        let hits: Vec<SearchHit> = state
            .heap
            .iter()
            .filter_map(|(id, embedding)| {
                let score = compute_similarity(&request.query_vector, embedding, metric);
                let slot = state.heap.slot(id)?;
                Some(SearchHit {
                    id,
                    score,
                    text: slot.text.clone(),
                    metadata: slot.extra.clone(),
                })
            })
            .collect();

        Ok(rank_hits(hits, request))
    }

    fn get(&self, ctx: &RequestContext, name: &str, ids: &[DocId]) -> RagResult<Vec<Record>> {
        ctx.check()?;
        let state = self.collection(name)?;
        let state = state.read();

        if !state.loaded {
            return Err(RagError::CollectionNotLoaded {
                name: name.to_string(),
            });
        }

        let mut sorted: Vec<DocId> = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        Ok(sorted.into_iter().filter_map(|id| state.heap.get(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_core::{Metadata, SimilarityMetric};

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    fn record(id: DocId, vector: Vec<f32>) -> Record {
        Record {
            id,
            vector,
            text: format!("doc {}", id),
            extra: Metadata::new(),
        }
    }

    fn loaded_store(metric: SimilarityMetric) -> InMemoryVectorStore {
        let store = InMemoryVectorStore::new();
        let schema = CollectionSchema::new("test", 3, metric);
        store.create_collection_if_absent(&ctx(), &schema).unwrap();
        store.load_collection(&ctx(), "test").unwrap();
        store
    }

    #[test]
    fn test_create_if_absent_reports_existing() {
        let store = InMemoryVectorStore::new();
        let schema = CollectionSchema::new("test", 3, SimilarityMetric::Cosine);
        assert_eq!(
            store.create_collection_if_absent(&ctx(), &schema).unwrap(),
            CreateOutcome::Created
        );

        let other = CollectionSchema::new("test", 8, SimilarityMetric::L2);
        assert_eq!(
            store.create_collection_if_absent(&ctx(), &other).unwrap(),
            CreateOutcome::Existing(schema)
        );
    }

    #[test]
    fn test_search_requires_load() {
        let store = InMemoryVectorStore::new();
        let schema = CollectionSchema::new("test", 3, SimilarityMetric::Cosine);
        store.create_collection_if_absent(&ctx(), &schema).unwrap();
        store
            .upsert(&ctx(), "test", vec![record(1, vec![1.0, 0.0, 0.0])])
            .unwrap();

        let request = RetrievalRequest::new(vec![1.0, 0.0, 0.0], 1);
        assert!(matches!(
            store.search(&ctx(), "test", &request),
            Err(RagError::CollectionNotLoaded { .. })
        ));

        store.load_collection(&ctx(), "test").unwrap();
        assert_eq!(store.search(&ctx(), "test", &request).unwrap().len(), 1);
    }

    #[test]
    fn test_search_orders_by_score_then_id() {
        let store = loaded_store(SimilarityMetric::Cosine);
        store
            .upsert(
                &ctx(),
                "test",
                vec![
                    record(3, vec![1.0, 0.0, 0.0]),
                    record(1, vec![1.0, 0.0, 0.0]),
                    record(2, vec![0.0, 1.0, 0.0]),
                    record(4, vec![0.7, 0.7, 0.0]),
                ],
            )
            .unwrap();

        let hits = store
            .search(&ctx(), "test", &RetrievalRequest::new(vec![1.0, 0.0, 0.0], 3))
            .unwrap();
        let ids: Vec<DocId> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_upsert_rejects_whole_batch() {
        let store = loaded_store(SimilarityMetric::Cosine);
        let result = store.upsert(
            &ctx(),
            "test",
            vec![record(1, vec![1.0, 0.0, 0.0]), record(2, vec![1.0, 0.0])],
        );
        assert!(matches!(result, Err(RagError::DimensionMismatch { .. })));

        let info = store.describe_collection(&ctx(), "test").unwrap().unwrap();
        assert_eq!(info.count, 0);
    }

    #[test]
    fn test_duplicate_ids_last_wins() {
        let store = loaded_store(SimilarityMetric::L2);
        let mut second = record(1, vec![0.0, 1.0, 0.0]);
        second.text = "second".to_string();
        store
            .upsert(&ctx(), "test", vec![record(1, vec![1.0, 0.0, 0.0]), second])
            .unwrap();

        let got = store.get(&ctx(), "test", &[1]).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].text, "second");
    }

    #[test]
    fn test_delete_ignores_absent_ids() {
        let store = loaded_store(SimilarityMetric::Ip);
        store
            .upsert(&ctx(), "test", vec![record(1, vec![1.0, 0.0, 0.0])])
            .unwrap();
        store.delete(&ctx(), "test", &[1, 99]).unwrap();
        assert!(store.get(&ctx(), "test", &[1]).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_collection() {
        let store = InMemoryVectorStore::new();
        assert!(store.describe_collection(&ctx(), "nope").unwrap().is_none());
        assert!(matches!(
            store.upsert(&ctx(), "nope", vec![]),
            Err(RagError::CollectionNotFound { .. })
        ));
        assert!(!store.drop_collection(&ctx(), "nope").unwrap());
    }

    #[test]
    fn test_cancelled_context_short_circuits() {
        let store = loaded_store(SimilarityMetric::Cosine);
        let cancelled = RequestContext::background();
        cancelled.cancel();
        assert!(matches!(
            store.upsert(&cancelled, "test", vec![record(1, vec![1.0, 0.0, 0.0])]),
            Err(RagError::Cancelled)
        ));
        assert_eq!(
            store.describe_collection(&ctx(), "test").unwrap().unwrap().count,
            0
        );
    }

    #[test]
    fn test_list_collections_sorted() {
        let store = InMemoryVectorStore::new();
        for name in ["zeta", "alpha", "mid"] {
            let schema = CollectionSchema::new(name, 2, SimilarityMetric::Cosine);
            store.create_collection_if_absent(&ctx(), &schema).unwrap();
        }
        assert_eq!(
            store.list_collections(&ctx()).unwrap(),
            vec!["alpha", "mid", "zeta"]
        );
    }
}
