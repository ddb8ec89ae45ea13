//! Text embedding
//!
//! [`EmbeddingClient`] turns text into fixed-length vectors. The trait is
//! object-safe for use as `Arc<dyn EmbeddingClient>`.
//!
//! # Implementations
//!
//! - [`ApiEmbedder`]: OpenAI-compatible `/embeddings` endpoint
//! - `testing::HashingEmbedder`: deterministic bag-of-words vectors

pub mod api;

pub use api::ApiEmbedder;

use ragline_core::{RagResult, RequestContext};

/// Converts text to embedding vectors
///
/// Failures surface as `EmbeddingUnavailable` (or `Cancelled` /
/// `DeadlineExceeded` from the context).
pub trait EmbeddingClient: Send + Sync {
    /// Embed one text
    fn embed(&self, ctx: &RequestContext, text: &str) -> RagResult<Vec<f32>>;

    /// Embed several texts, one vector per input, in input order
    ///
    /// The default calls [`embed`](Self::embed) per text and checks the
    /// context between calls.
    fn embed_batch(&self, ctx: &RequestContext, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                ctx.check()?;
                self.embed(ctx, text)
            })
            .collect()
    }
}
