//! Intelligence layer for ragline
//!
//! Everything between raw text and a generated answer:
//! - EmbeddingClient trait, with ApiEmbedder for OpenAI-compatible endpoints
//! - Generator trait, with ApiGenerator for chat completions
//! - Indexer: embed documents and upsert them, idempotent by primary key
//! - Retriever: embed a query and search a collection
//! - PromptTemplate: `{{question}}` / `{{context}}` instruction templates
//! - RagFlow: index, retrieve, prompt, generate as one call
//!
//! # Usage
//!
//! ```ignore
//! use ragline_intelligence::{ApiEmbedder, ApiGenerator, RagFlow};
//!
//! let flow = RagFlow::new(Arc::new(embedder), collection, Arc::new(generator));
//! flow.stage(docs);
//! let answer = flow.answer(&ctx, "I want to buy an iphone")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod embed;
pub mod flow;
pub mod generate;
pub mod indexer;
pub mod llm_client;
pub mod prompt;
pub mod retriever;
pub mod testing;

pub use embed::{ApiEmbedder, EmbeddingClient};
pub use flow::{FlowAnswer, FlowError, FlowStage, RagFlow};
pub use generate::{ApiGenerator, Generator};
pub use indexer::{IndexReport, Indexer, SkippedDocument};
pub use llm_client::LlmClientError;
pub use prompt::{build_context, PromptTemplate, DEFAULT_TEMPLATE};
pub use retriever::Retriever;
