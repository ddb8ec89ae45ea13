//! VectorCollection: schema and lifecycle of one named collection
//!
//! The handle owns the schema it was built with. Every data operation is
//! validated against that schema locally before the store sees it, and
//! search results are re-ranked here so the (score desc, id asc) order holds
//! no matter which backend answered.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use ragline_core::{
    CollectionInfo, CollectionSchema, DocId, RagError, RagResult, Record, RequestContext,
    RetrievalRequest, SearchHit,
};

use crate::backend::{CreateOutcome, VectorStore};
use crate::ranking::rank_hits;

/// Handle on one collection inside a [`VectorStore`]
///
/// `Send + Sync`; share it behind an `Arc`.
pub struct VectorCollection {
    store: Arc<dyn VectorStore>,
    schema: CollectionSchema,
    ensure_lock: Mutex<()>,
}

impl VectorCollection {
    /// Bind a schema to a store. Does not touch the store.
    pub fn new(store: Arc<dyn VectorStore>, schema: CollectionSchema) -> RagResult<Self> {
        schema.validate()?;
        Ok(VectorCollection {
            store,
            schema,
            ensure_lock: Mutex::new(()),
        })
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// The schema this handle was created with
    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Embedding dimension
    pub fn dimension(&self) -> usize {
        self.schema.vector_dim
    }

    /// Create the collection if absent and make sure it is loaded
    ///
    /// Returns true when this call created the collection. An existing
    /// collection whose schema differs in any field fails with
    /// `SchemaConflict` and is left untouched.
    pub fn ensure(&self, ctx: &RequestContext) -> RagResult<bool> {
        let _guard = self.ensure_lock.lock();
        let name = self.name();

        match self.store.create_collection_if_absent(ctx, &self.schema)? {
            CreateOutcome::Created => {
                self.store.load_collection(ctx, name)?;
                info!(
                    target: "ragline::store",
                    collection = name,
                    dimension = self.schema.vector_dim,
                    metric = %self.schema.similarity_metric,
                    store = self.store.kind(),
                    "Collection created"
                );
                Ok(true)
            }
            CreateOutcome::Existing(existing) => {
                self.schema.check_compatible(&existing)?;
                let loaded = self
                    .store
                    .describe_collection(ctx, name)?
                    .map(|info| info.loaded)
                    .unwrap_or(false);
                if !loaded {
                    self.store.load_collection(ctx, name)?;
                    debug!(target: "ragline::store", collection = name, "Existing collection loaded");
                }
                Ok(false)
            }
        }
    }

    /// Insert or replace records by primary key
    ///
    /// The whole batch is validated first; one bad record rejects the call
    /// and nothing is written.
    pub fn upsert(&self, ctx: &RequestContext, records: Vec<Record>) -> RagResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        for record in &records {
            self.schema.check_record(record)?;
        }

        let count = records.len();
        self.store.upsert(ctx, self.name(), records)?;
        debug!(target: "ragline::store", collection = self.name(), count, "Records upserted");
        Ok(())
    }

    /// Remove records by primary key; ids that do not exist are ignored
    pub fn delete(&self, ctx: &RequestContext, ids: &[DocId]) -> RagResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store.delete(ctx, self.name(), ids)?;
        debug!(target: "ragline::store", collection = self.name(), count = ids.len(), "Records deleted");
        Ok(())
    }

    /// Similarity search, best first
    pub fn search(
        &self,
        ctx: &RequestContext,
        request: &RetrievalRequest,
    ) -> RagResult<Vec<SearchHit>> {
        request.validate()?;
        if request.query_vector.len() != self.schema.vector_dim {
            return Err(RagError::DimensionMismatch {
                expected: self.schema.vector_dim,
                got: request.query_vector.len(),
            });
        }

        let start = Instant::now();
        let hits = self.store.search(ctx, self.name(), request)?;

        // Re-apply ordering at the facade; remote backends may break ties
        // differently or return NaN scores.
        let hits = rank_hits(hits, request);

        debug!(
            target: "ragline::store",
            collection = self.name(),
            limit = request.limit,
            results = hits.len(),
            duration_us = start.elapsed().as_micros() as u64,
            "Vector search completed"
        );
        Ok(hits)
    }

    /// Fetch records by primary key, ascending; absent ids are skipped
    pub fn get(&self, ctx: &RequestContext, ids: &[DocId]) -> RagResult<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut records = self.store.get(ctx, self.name(), ids)?;
        records.sort_by_key(|r| r.id);
        records.dedup_by_key(|r| r.id);
        Ok(records)
    }

    /// Number of records currently stored
    pub fn count(&self, ctx: &RequestContext) -> RagResult<usize> {
        Ok(self.describe(ctx)?.count)
    }

    /// Stored schema, record count and load state
    pub fn describe(&self, ctx: &RequestContext) -> RagResult<CollectionInfo> {
        self.store
            .describe_collection(ctx, self.name())?
            .ok_or_else(|| RagError::CollectionNotFound {
                name: self.name().to_string(),
            })
    }

    /// Drop the collection and every record in it
    ///
    /// Returns true if it existed. A later `ensure` recreates it empty.
    pub fn drop_collection(&self, ctx: &RequestContext) -> RagResult<bool> {
        let _guard = self.ensure_lock.lock();
        let existed = self.store.drop_collection(ctx, self.name())?;
        if existed {
            info!(target: "ragline::store", collection = self.name(), "Collection dropped");
        }
        Ok(existed)
    }
}

impl std::fmt::Debug for VectorCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorCollection")
            .field("store", &self.store.kind())
            .field("schema", &self.schema)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryVectorStore;
    use ragline_core::{Metadata, SimilarityMetric};

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    fn collection(dim: usize, metric: SimilarityMetric) -> VectorCollection {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        VectorCollection::new(store, CollectionSchema::new("test", dim, metric)).unwrap()
    }

    fn record(id: DocId, vector: Vec<f32>) -> Record {
        Record {
            id,
            vector,
            text: format!("doc {}", id),
            extra: Metadata::new(),
        }
    }

    #[test]
    fn test_new_rejects_invalid_schema() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let bad = CollectionSchema::new("_reserved", 3, SimilarityMetric::Cosine);
        assert!(matches!(
            VectorCollection::new(store, bad),
            Err(RagError::InvalidCollectionName { .. })
        ));
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let c = collection(3, SimilarityMetric::Cosine);
        assert!(c.ensure(&ctx()).unwrap());
        assert!(!c.ensure(&ctx()).unwrap());
        let info = c.describe(&ctx()).unwrap();
        assert!(info.loaded);
        assert_eq!(info.count, 0);
    }

    #[test]
    fn test_ensure_schema_conflict() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let first = VectorCollection::new(
            Arc::clone(&store),
            CollectionSchema::new("shared", 3, SimilarityMetric::Cosine),
        )
        .unwrap();
        first.ensure(&ctx()).unwrap();

        let second = VectorCollection::new(
            store,
            CollectionSchema::new("shared", 4, SimilarityMetric::Cosine),
        )
        .unwrap();
        assert!(matches!(
            second.ensure(&ctx()),
            Err(RagError::SchemaConflict { field, .. }) if field == "vector_dim"
        ));
    }

    #[test]
    fn test_ensure_loads_existing_unloaded_collection() {
        let store = Arc::new(InMemoryVectorStore::new());
        let schema = CollectionSchema::new("cold", 2, SimilarityMetric::L2);
        store.create_collection_if_absent(&ctx(), &schema).unwrap();

        let c = VectorCollection::new(store, schema).unwrap();
        assert!(!c.describe(&ctx()).unwrap().loaded);
        assert!(!c.ensure(&ctx()).unwrap());
        assert!(c.describe(&ctx()).unwrap().loaded);
    }

    #[test]
    fn test_search_validates_request() {
        let c = collection(3, SimilarityMetric::Cosine);
        c.ensure(&ctx()).unwrap();

        assert!(matches!(
            c.search(&ctx(), &RetrievalRequest::new(vec![1.0, 0.0, 0.0], 0)),
            Err(RagError::InvalidInput { .. })
        ));
        assert!(matches!(
            c.search(&ctx(), &RetrievalRequest::new(vec![1.0, 0.0], 1)),
            Err(RagError::DimensionMismatch { expected: 3, got: 2 })
        ));
        assert!(c
            .search(&ctx(), &RetrievalRequest::new(vec![1.0, 0.0, 0.0], 5))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_upsert_then_search() {
        let c = collection(2, SimilarityMetric::Cosine);
        c.ensure(&ctx()).unwrap();
        c.upsert(
            &ctx(),
            vec![
                record(1, vec![1.0, 0.0]),
                record(2, vec![0.0, 1.0]),
                record(3, vec![0.8, 0.2]),
            ],
        )
        .unwrap();
        assert_eq!(c.count(&ctx()).unwrap(), 3);

        let hits = c
            .search(
                &ctx(),
                &RetrievalRequest::new(vec![1.0, 0.0], 10).with_threshold(Some(0.5)),
            )
            .unwrap();
        let ids: Vec<DocId> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_upsert_rejected_batch_writes_nothing() {
        let c = collection(2, SimilarityMetric::Cosine);
        c.ensure(&ctx()).unwrap();
        let result = c.upsert(
            &ctx(),
            vec![record(1, vec![1.0, 0.0]), record(2, vec![1.0, 0.0, 0.0])],
        );
        assert!(matches!(result, Err(RagError::DimensionMismatch { .. })));
        assert_eq!(c.count(&ctx()).unwrap(), 0);
    }

    #[test]
    fn test_delete_and_get() {
        let c = collection(2, SimilarityMetric::Ip);
        c.ensure(&ctx()).unwrap();
        c.upsert(&ctx(), vec![record(2, vec![1.0, 0.0]), record(1, vec![0.0, 1.0])])
            .unwrap();

        let got = c.get(&ctx(), &[2, 1, 2, 7]).unwrap();
        let ids: Vec<DocId> = got.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);

        c.delete(&ctx(), &[1, 99]).unwrap();
        c.delete(&ctx(), &[]).unwrap();
        assert_eq!(c.count(&ctx()).unwrap(), 1);
    }

    #[test]
    fn test_drop_then_ensure_recreates_empty() {
        let c = collection(2, SimilarityMetric::Cosine);
        c.ensure(&ctx()).unwrap();
        c.upsert(&ctx(), vec![record(1, vec![1.0, 0.0])]).unwrap();

        assert!(c.drop_collection(&ctx()).unwrap());
        assert!(matches!(
            c.describe(&ctx()),
            Err(RagError::CollectionNotFound { .. })
        ));
        assert!(!c.drop_collection(&ctx()).unwrap());

        assert!(c.ensure(&ctx()).unwrap());
        assert_eq!(c.count(&ctx()).unwrap(), 0);
    }
}
