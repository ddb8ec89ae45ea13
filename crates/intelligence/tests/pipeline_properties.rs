//! Property tests for prompt rendering and indexing

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use ragline_core::{CollectionSchema, Document, RequestContext, SimilarityMetric};
use ragline_intelligence::testing::HashingEmbedder;
use ragline_intelligence::{Indexer, PromptTemplate};
use ragline_store::{InMemoryVectorStore, VectorCollection, VectorStore};

proptest! {
    #[test]
    fn rendered_prompt_contains_inputs_verbatim(
        question in "[a-zA-Z0-9 ?{}]{0,40}",
        context in "[a-zA-Z0-9 $\n{}]{0,80}",
    ) {
        let template = PromptTemplate::default();
        let prompt = template.render(&question, &context);
        let expected = format!("Question: {}\nContext: {}\n", question, context);
        prop_assert!(prompt.ends_with(&expected));
    }

    #[test]
    fn index_keeps_last_text_per_id(
        docs in prop::collection::vec((0i64..10, "[a-z]{1,8}( [a-z]{1,8}){0,3}"), 1..25),
        upsert_batch in prop::option::of(1usize..6),
    ) {
        let ctx = RequestContext::background();
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let collection = Arc::new(
            VectorCollection::new(store, CollectionSchema::new("p", 16, SimilarityMetric::Cosine))
                .unwrap(),
        );
        collection.ensure(&ctx).unwrap();
        let indexer = Indexer::new(Arc::new(HashingEmbedder::new(16)), Arc::clone(&collection))
            .with_embed_batch_size(3)
            .with_upsert_batch_size(upsert_batch);

        let expected: BTreeMap<i64, String> = docs.iter().cloned().collect();
        let report = indexer
            .index(&ctx, docs.into_iter().map(|(id, text)| Document::new(id, text)).collect())
            .unwrap();

        prop_assert_eq!(report.upserted.len(), expected.len());
        prop_assert_eq!(collection.count(&ctx).unwrap(), expected.len());

        let ids: Vec<i64> = expected.keys().copied().collect();
        let stored = collection.get(&ctx, &ids).unwrap();
        let stored: BTreeMap<i64, String> = stored.into_iter().map(|r| (r.id, r.text)).collect();
        prop_assert_eq!(stored, expected);
    }
}
