//! Embedding similarity.

use rollcall_types::Embedding;

/// `dot(a, b) / (|a| * |b|)`, clamped to `[-1, 1]`.
///
/// A zero norm product, a non-finite result, or mismatched dimensions give 0.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let denominator = a.norm() * b.norm();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    let similarity = a.dot(b) / denominator;
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

pub fn is_match(similarity: f64, threshold: f64) -> bool {
    similarity >= threshold
}
