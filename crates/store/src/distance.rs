//! Similarity functions for brute-force search.
//!
//! All scores are normalized to "higher = more similar" and accumulated in
//! f64, single-threaded, so the same inputs always give the same score.
//! Vectors are used as-is; nothing is normalized implicitly.

use ragline_core::SimilarityMetric;

/// Compute the similarity score between two vectors
pub fn compute_similarity(a: &[f32], b: &[f32], metric: SimilarityMetric) -> f64 {
    debug_assert_eq!(
        a.len(),
        b.len(),
        "Dimension mismatch in similarity computation"
    );

    match metric {
        SimilarityMetric::Cosine => cosine_similarity(a, b),
        SimilarityMetric::L2 => l2_similarity(euclidean_distance(a, b)),
        SimilarityMetric::Ip => dot_product(a, b),
    }
}

/// Map an L2 distance onto the (0, 1] similarity scale
pub fn l2_similarity(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// Cosine similarity: dot(a,b) / (||a|| * ||b||)
///
/// Returns 0.0 if either vector has zero norm.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot = dot_product(a, b);
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Dot product (inner product)
pub fn dot_product(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn l2_norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt()
}

/// Euclidean distance (L2 distance)
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (f64::from(*x) - f64::from(*y)).powi(2))
        .sum::<f64>()
        .sqrt()
}
