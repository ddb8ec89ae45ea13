//! Hit ordering shared by the in-memory backend and the collection facade
//!
//! The total order is (score desc, id asc). `f64::total_cmp` keeps the sort
//! well-defined even when a backend hands back a NaN; those hits are removed
//! by the threshold filter before truncation.

use std::cmp::Ordering;

use ragline_core::{RetrievalRequest, SearchHit};

/// Compare two hits: score descending, then id ascending
pub fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

/// Filter by threshold, sort, and truncate to the request limit
pub fn rank_hits(mut hits: Vec<SearchHit>, request: &RetrievalRequest) -> Vec<SearchHit> {
    hits.retain(|h| request.accepts(h.score));
    hits.sort_by(compare_hits);
    hits.truncate(request.limit);
    hits
}
