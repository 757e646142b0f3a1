//! Similarity computation functions for embedding vectors
//!
//! Accumulation happens in `f64` and is narrowed to `f32` once at the end.

use sift_kernel::rag::SimilarityMetric;

/// Compute similarity between two embedding vectors using the given metric.
///
/// For Cosine and DotProduct, higher values mean more similar.
/// For Euclidean, the raw distance is converted so that higher values
/// still mean more similar (using 1 / (1 + distance)).
/// Vectors of different lengths or empty vectors score 0.0 under every metric.
pub fn compute_similarity(a: &[f32], b: &[f32], metric: SimilarityMetric) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    match metric {
        SimilarityMetric::Cosine => cosine_similarity(a, b),
        SimilarityMetric::Euclidean => {
            let dist = euclidean_distance(a, b);
            (1.0 / (1.0 + dist)) as f32
        }
        SimilarityMetric::DotProduct => dot_product(a, b) as f32,
    }
}

/// Cosine similarity between two vectors.
///
/// Returns a value between -1.0 and 1.0 (1.0 for identical direction,
/// 0.0 for orthogonal, -1.0 for opposite direction).
/// Returns 0.0 if the lengths differ, either vector is empty, or either
/// vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (f64::from(*x) - f64::from(*y)).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn dot_product(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}
