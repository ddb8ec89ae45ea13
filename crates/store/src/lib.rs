//! Vector collections for ragline
//!
//! - `VectorStore`: the seam to whatever holds the vectors
//! - `InMemoryVectorStore`: brute-force, deterministic, in-process
//! - `MilvusRestStore`: Milvus v2 REST client (transport behind the `milvus` feature)
//! - `VectorCollection`: schema-bound handle with ensure/upsert/delete/search

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod collection;
pub mod distance;
mod heap;
pub mod memory;
pub mod milvus;
pub mod ranking;

use std::sync::Arc;

use ragline_core::{RagError, RagResult, StoreConfig};

pub use backend::{CreateOutcome, VectorStore};
pub use collection::VectorCollection;
pub use distance::compute_similarity;
pub use memory::InMemoryVectorStore;
pub use milvus::MilvusRestStore;
pub use ranking::{compare_hits, rank_hits};

/// Address that selects the in-process store
pub const MEMORY_ADDRESS: &str = "memory";

/// Open the store named by `config.address`
///
/// `"memory"` gives a fresh [`InMemoryVectorStore`]; an `http://` or
/// `https://` URL gives a [`MilvusRestStore`] and requires the `milvus`
/// feature.
pub fn open_store(config: &StoreConfig) -> RagResult<Arc<dyn VectorStore>> {
    let address = config.address.trim();
    if address == MEMORY_ADDRESS {
        return Ok(Arc::new(InMemoryVectorStore::new()));
    }
    if address.starts_with("http://") || address.starts_with("https://") {
        if !cfg!(feature = "milvus") {
            return Err(RagError::Config(format!(
                "store address '{}' needs the 'milvus' feature",
                address
            )));
        }
        return Ok(Arc::new(MilvusRestStore::from_config(config)));
    }
    Err(RagError::Config(format!(
        "unsupported store address '{}': expected \"memory\" or an http(s) URL",
        address
    )))
}
