//! Indexer: documents in, embedded records upserted
//!
//! Indexing is idempotent by primary key. Re-indexing the same ids with the
//! same text leaves the collection in the same state, because records go
//! through the store's native upsert.
//!
//! Per-document validation failures (wrong embedding dimension, text over the
//! bound, disallowed metadata) are skipped and reported; they never fail the
//! batch. Infrastructure failures do.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use ragline_core::{DocId, Document, IndexConfig, RagError, RagResult, Record, RequestContext};
use ragline_store::VectorCollection;

use crate::embed::EmbeddingClient;

/// A document that was not indexed, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDocument {
    /// Primary key of the document
    pub id: DocId,
    /// Validation error message
    pub reason: String,
}

/// Outcome of one `index` call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexReport {
    /// Primary keys written, in input order
    pub upserted: Vec<DocId>,
    /// Documents rejected by validation
    pub skipped: Vec<SkippedDocument>,
}

impl IndexReport {
    /// True when no document was skipped
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Embeds documents and upserts them into one collection
pub struct Indexer {
    embedder: Arc<dyn EmbeddingClient>,
    collection: Arc<VectorCollection>,
    embed_batch_size: usize,
    upsert_batch_size: Option<usize>,
}

impl Indexer {
    /// Create an indexer with default batching (64 texts per embedding
    /// request, one upsert per call)
    pub fn new(embedder: Arc<dyn EmbeddingClient>, collection: Arc<VectorCollection>) -> Self {
        let defaults = IndexConfig::default();
        Indexer {
            embedder,
            collection,
            embed_batch_size: defaults.embed_batch_size,
            upsert_batch_size: defaults.upsert_batch_size,
        }
    }

    /// Apply the `[index]` config section
    pub fn with_config(self, config: &IndexConfig) -> Self {
        self.with_embed_batch_size(config.embed_batch_size)
            .with_upsert_batch_size(config.upsert_batch_size)
    }

    /// Texts per embedding request (minimum 1)
    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size.max(1);
        self
    }

    /// Records per upsert call; `None` upserts everything at once
    pub fn with_upsert_batch_size(mut self, size: Option<usize>) -> Self {
        self.upsert_batch_size = size.map(|s| s.max(1));
        self
    }

    /// The collection records are written to
    pub fn collection(&self) -> &Arc<VectorCollection> {
        &self.collection
    }

    /// Embed and upsert `docs`
    ///
    /// Duplicate ids within one call collapse to the last document. The
    /// context is checked before every embedding batch and every upsert
    /// chunk. If a later chunk fails after earlier ones were committed the
    /// error is `PartialIndex`, naming both sets of ids and the skipped
    /// documents.
    pub fn index(&self, ctx: &RequestContext, docs: Vec<Document>) -> RagResult<IndexReport> {
        let docs = dedup_last_wins(docs);
        let mut report = IndexReport::default();
        if docs.is_empty() {
            return Ok(report);
        }

        let schema = self.collection.schema();
        let mut records: Vec<Record> = Vec::with_capacity(docs.len());

        let mut docs = docs.into_iter().peekable();
        while docs.peek().is_some() {
            ctx.check()?;
            let batch: Vec<Document> = docs.by_ref().take(self.embed_batch_size).collect();
            let texts: Vec<&str> = batch.iter().map(|d| d.text.as_str()).collect();

            let vectors = self.embedder.embed_batch(ctx, &texts)?;
            if vectors.len() != batch.len() {
                return Err(RagError::EmbeddingUnavailable(format!(
                    "requested {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            for (doc, vector) in batch.into_iter().zip(vectors) {
                let record = Record::from_document(doc, vector);
                match schema.check_record(&record) {
                    Ok(()) => records.push(record),
                    Err(e) if e.is_validation_error() => {
                        warn!(
                            target: "ragline::index",
                            collection = self.collection.name(),
                            id = record.id,
                            error = %e,
                            "Document skipped"
                        );
                        report.skipped.push(SkippedDocument {
                            id: record.id,
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        self.upsert_chunks(ctx, records, &mut report)?;

        info!(
            target: "ragline::index",
            collection = self.collection.name(),
            upserted = report.upserted.len(),
            skipped = report.skipped.len(),
            "Documents indexed"
        );
        Ok(report)
    }

    fn upsert_chunks(
        &self,
        ctx: &RequestContext,
        records: Vec<Record>,
        report: &mut IndexReport,
    ) -> RagResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let chunk_size = self.upsert_batch_size.unwrap_or(records.len());
        let ids: Vec<DocId> = records.iter().map(|r| r.id).collect();

        let mut records = records.into_iter().peekable();
        let mut committed = 0;
        while records.peek().is_some() {
            let chunk: Vec<Record> = records.by_ref().take(chunk_size).collect();
            let len = chunk.len();

            let result = ctx
                .check()
                .and_then(|()| self.collection.upsert(ctx, chunk));
            if let Err(source) = result {
                if committed == 0 {
                    return Err(source);
                }
                warn!(
                    target: "ragline::index",
                    collection = self.collection.name(),
                    committed,
                    remaining = ids.len() - committed,
                    error = %source,
                    "Indexing interrupted"
                );
                return Err(RagError::PartialIndex {
                    upserted: ids[..committed].to_vec(),
                    remaining: ids[committed..].to_vec(),
                    skipped: report
                        .skipped
                        .iter()
                        .map(|s| (s.id, s.reason.clone()))
                        .collect(),
                    source: Box::new(source),
                });
            }

            committed += len;
            debug!(target: "ragline::index", collection = self.collection.name(), count = len, "Chunk upserted");
        }

        report.upserted = ids;
        Ok(())
    }
}

/// Collapse duplicate ids, keeping the last document at the first position
fn dedup_last_wins(docs: Vec<Document>) -> Vec<Document> {
    let mut position: HashMap<DocId, usize> = HashMap::with_capacity(docs.len());
    let mut out: Vec<Document> = Vec::with_capacity(docs.len());
    for doc in docs {
        match position.get(&doc.id) {
            Some(&i) => out[i] = doc,
            None => {
                position.insert(doc.id, out.len());
                out.push(doc);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, FlakyStore, HashingEmbedder};
    use ragline_core::{CollectionSchema, SimilarityMetric};
    use ragline_store::{InMemoryVectorStore, VectorStore};

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    fn collection_on(store: Arc<dyn VectorStore>, dim: usize) -> Arc<VectorCollection> {
        let c = VectorCollection::new(store, CollectionSchema::new("docs", dim, SimilarityMetric::Cosine))
            .unwrap();
        c.ensure(&ctx()).unwrap();
        Arc::new(c)
    }

    fn indexer(dim: usize) -> Indexer {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        Indexer::new(Arc::new(HashingEmbedder::new(dim)), collection_on(store, dim))
    }

    fn phones() -> Vec<Document> {
        vec![
            Document::new(1, "iPhone 17 $1000"),
            Document::new(2, "Samsung s25 $900"),
            Document::new(3, "Pixel 9 $800"),
            Document::new(4, "Xiaomi 15 $300"),
        ]
    }

    #[test]
    fn test_index_reports_upserted_ids() {
        let idx = indexer(16);
        let report = idx.index(&ctx(), phones()).unwrap();
        assert_eq!(report.upserted, vec![1, 2, 3, 4]);
        assert!(report.is_complete());
        assert_eq!(idx.collection().count(&ctx()).unwrap(), 4);
    }

    #[test]
    fn test_index_is_idempotent() {
        let idx = indexer(16);
        idx.index(&ctx(), phones()).unwrap();
        let first = idx.collection().get(&ctx(), &[1, 2, 3, 4]).unwrap();
        idx.index(&ctx(), phones()).unwrap();
        let second = idx.collection().get(&ctx(), &[1, 2, 3, 4]).unwrap();
        assert_eq!(first, second);
        assert_eq!(idx.collection().count(&ctx()).unwrap(), 4);
    }

    #[test]
    fn test_empty_input() {
        let idx = indexer(8);
        assert_eq!(idx.index(&ctx(), Vec::new()).unwrap(), IndexReport::default());
    }

    #[test]
    fn test_duplicate_ids_last_wins() {
        let idx = indexer(8);
        let report = idx
            .index(
                &ctx(),
                vec![
                    Document::new(1, "first"),
                    Document::new(2, "other"),
                    Document::new(1, "second"),
                ],
            )
            .unwrap();
        assert_eq!(report.upserted, vec![1, 2]);
        let got = idx.collection().get(&ctx(), &[1]).unwrap();
        assert_eq!(got[0].text, "second");
    }

    #[test]
    fn test_text_over_bound_is_skipped() {
        let idx = indexer(8);
        let long = "x".repeat(513);
        let report = idx
            .index(&ctx(), vec![Document::new(1, "ok"), Document::new(2, long)])
            .unwrap();
        assert_eq!(report.upserted, vec![1]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, 2);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_wrong_dimension_is_skipped() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let idx = Indexer::new(Arc::new(HashingEmbedder::new(4)), collection_on(store, 8));
        let report = idx.index(&ctx(), phones()).unwrap();
        assert!(report.upserted.is_empty());
        assert_eq!(report.skipped.len(), 4);
        assert!(report.skipped[0].reason.contains("Dimension mismatch"));
    }

    #[test]
    fn test_embedding_failure_aborts() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let collection = collection_on(store, 8);
        let idx = Indexer::new(Arc::new(FailingEmbedder), Arc::clone(&collection));
        assert!(matches!(
            idx.index(&ctx(), phones()),
            Err(RagError::EmbeddingUnavailable(_))
        ));
        assert_eq!(collection.count(&ctx()).unwrap(), 0);
    }

    #[test]
    fn test_cancelled_before_embedding() {
        let idx = indexer(8);
        let cancelled = RequestContext::background();
        cancelled.cancel();
        assert!(matches!(
            idx.index(&cancelled, phones()),
            Err(RagError::Cancelled)
        ));
    }

    #[test]
    fn test_partial_index_after_first_chunk() {
        let inner: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let flaky: Arc<dyn VectorStore> = Arc::new(FlakyStore::new(inner, 1));
        let collection = collection_on(flaky, 8);
        let idx = Indexer::new(Arc::new(HashingEmbedder::new(8)), Arc::clone(&collection))
            .with_upsert_batch_size(Some(2));

        let mut docs = phones();
        docs.push(Document::new(5, "x".repeat(600)));

        match idx.index(&ctx(), docs) {
            Err(RagError::PartialIndex {
                upserted,
                remaining,
                skipped,
                source,
            }) => {
                assert_eq!(upserted, vec![1, 2]);
                assert_eq!(remaining, vec![3, 4]);
                assert_eq!(skipped.len(), 1);
                assert_eq!(skipped[0].0, 5);
                assert!(matches!(*source, RagError::StoreUnavailable(_)));
            }
            other => panic!("expected PartialIndex, got {:?}", other),
        }
        assert_eq!(collection.count(&ctx()).unwrap(), 2);
    }

    #[test]
    fn test_first_chunk_failure_is_plain_error() {
        let inner: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let flaky: Arc<dyn VectorStore> = Arc::new(FlakyStore::new(inner, 0));
        let idx = Indexer::new(Arc::new(HashingEmbedder::new(8)), collection_on(flaky, 8));
        assert!(matches!(
            idx.index(&ctx(), phones()),
            Err(RagError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_small_embed_batches() {
        let idx = indexer(8).with_embed_batch_size(1).with_upsert_batch_size(Some(3));
        let report = idx.index(&ctx(), phones()).unwrap();
        assert_eq!(report.upserted.len(), 4);
        assert_eq!(idx.collection().count(&ctx()).unwrap(), 4);
    }
}
