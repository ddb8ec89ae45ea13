//! RagFlow: index staged documents, retrieve, render the prompt, generate
//!
//! One `answer` call runs the whole pipeline. Any stage failure aborts the
//! call with a [`FlowError`] naming the stage; nothing is retried.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use ragline_core::{Document, IndexConfig, RagError, RequestContext, RetrievalConfig, SearchHit};
use ragline_store::VectorCollection;

use crate::embed::EmbeddingClient;
use crate::generate::Generator;
use crate::indexer::{IndexReport, Indexer};
use crate::prompt::{build_context, PromptTemplate};
use crate::retriever::Retriever;

/// Pipeline stage a flow error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    /// Indexing staged documents
    Index,
    /// Embedding the query and searching
    Retrieve,
    /// Assembling context and rendering the template
    Prompt,
    /// Calling the generator
    Generate,
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlowStage::Index => "index",
            FlowStage::Retrieve => "retrieve",
            FlowStage::Prompt => "prompt",
            FlowStage::Generate => "generate",
        })
    }
}

/// A failed `answer` call
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct FlowError {
    /// Where the pipeline stopped
    pub stage: FlowStage,
    /// Underlying error
    pub source: RagError,
}

impl FlowError {
    fn at(stage: FlowStage) -> impl FnOnce(RagError) -> FlowError {
        move |source| FlowError { stage, source }
    }
}

/// Answer plus the material it was generated from
#[derive(Debug, Clone, PartialEq)]
pub struct FlowAnswer {
    /// Generated text
    pub answer: String,
    /// Hits used as context, best first
    pub hits: Vec<SearchHit>,
    /// Prompt sent to the generator
    pub prompt: String,
    /// Report for documents indexed by this call, if any were staged
    pub indexed: Option<IndexReport>,
}

/// Retrieval-augmented generation over one collection
pub struct RagFlow {
    indexer: Indexer,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    top_k: usize,
    score_threshold: Option<f64>,
    pending: Mutex<Vec<Document>>,
}

impl RagFlow {
    /// Wire a flow from its collaborators, with the default template and
    /// `top_k = 2`
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        collection: Arc<VectorCollection>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let retrieval = RetrievalConfig::default();
        RagFlow {
            indexer: Indexer::new(Arc::clone(&embedder), Arc::clone(&collection)),
            retriever: Retriever::new(embedder, collection),
            generator,
            template: PromptTemplate::default(),
            top_k: retrieval.top_k,
            score_threshold: retrieval.score_threshold,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Replace the instruction template
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Apply the `[retrieval]` config section
    pub fn with_retrieval(mut self, config: &RetrievalConfig) -> Self {
        self.top_k = config.top_k;
        self.score_threshold = config.score_threshold;
        self
    }

    /// Apply the `[index]` config section
    pub fn with_index_config(mut self, config: &IndexConfig) -> Self {
        self.indexer = self.indexer.with_config(config);
        self
    }

    /// The indexer behind this flow
    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    /// The retriever behind this flow
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Queue documents to be indexed by the next `answer` call
    pub fn stage(&self, docs: impl IntoIterator<Item = Document>) {
        self.pending.lock().extend(docs);
    }

    /// Number of documents waiting to be indexed
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Run the pipeline and return only the generated text
    ///
    /// The report of any staged indexing is dropped; use
    /// [`RagFlow::answer_with_context`] to see which documents were skipped.
    pub fn answer(&self, ctx: &RequestContext, query: &str) -> Result<String, FlowError> {
        self.answer_with_context(ctx, query).map(|a| a.answer)
    }

    /// Run the pipeline and return the answer with its hits and prompt
    pub fn answer_with_context(
        &self,
        ctx: &RequestContext,
        query: &str,
    ) -> Result<FlowAnswer, FlowError> {
        let indexed = self.index_pending(ctx)?;

        let hits = self
            .retriever
            .retrieve(ctx, query, self.top_k, self.score_threshold)
            .map_err(FlowError::at(FlowStage::Retrieve))?;

        ctx.check().map_err(FlowError::at(FlowStage::Prompt))?;
        let prompt = self.template.render(query, &build_context(&hits));
        debug!(target: "ragline::flow", hits = hits.len(), prompt_len = prompt.len(), "Prompt rendered");

        let answer = self
            .generator
            .generate(ctx, &prompt)
            .map_err(FlowError::at(FlowStage::Generate))?;

        info!(target: "ragline::flow", hits = hits.len(), "Answer generated");
        Ok(FlowAnswer {
            answer,
            hits,
            prompt,
            indexed,
        })
    }

    /// Index staged documents; on failure they stay staged
    fn index_pending(&self, ctx: &RequestContext) -> Result<Option<IndexReport>, FlowError> {
        // Held across indexing so concurrent answers index each batch once
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return Ok(None);
        }

        match self.indexer.index(ctx, pending.clone()) {
            Ok(report) => {
                pending.clear();
                Ok(Some(report))
            }
            Err(e) => {
                warn!(target: "ragline::flow", staged = pending.len(), error = %e, "Indexing staged documents failed");
                Err(FlowError::at(FlowStage::Index)(e))
            }
        }
    }
}
