//! Vector similarity functions.

use ndarray::ArrayView1;

/// Compute the cosine similarity between two f32 slices.
///
/// Returns `0.0` for empty slices, mismatched lengths, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);

    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    a.dot(&b) / (norm_a * norm_b)
}

/// Similarity score in `[0, 1]`: cosine similarity with anti-correlated
/// vectors clamped to zero.
pub fn similarity_score(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity(a, b).clamp(0.0, 1.0)
}

/// Dot product of two vectors that are already L2-normalised, clamped to `[0, 1]`.
pub fn normalized_score(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    ArrayView1::from(a).dot(&ArrayView1::from(b)).clamp(0.0, 1.0)
}

/// L2-normalize a vector. Zero vectors stay zero.
pub fn normalize_l2(v: &[f32]) -> Vec<f32> {
    let arr = ArrayView1::from(v);
    let norm = arr.dot(&arr).sqrt();
    if norm == 0.0 {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| x / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn cosine_known_vectors() {
        // |a| = |b| = 5, dot = 24
        assert!(approx_eq(cosine_similarity(&[3.0, 4.0], &[4.0, 3.0]), 0.96));
        assert!(approx_eq(cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 1.0));
    }

    #[test]
    fn cosine_degenerate_inputs_are_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn score_clamps_opposite_vectors() {
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), -1.0));
        assert_eq!(similarity_score(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
    }

    #[test]
    fn normalized_score_matches_cosine() {
        let a = normalize_l2(&[3.0, 4.0]);
        let b = normalize_l2(&[4.0, 3.0]);
        assert!(approx_eq(normalized_score(&a, &b), 0.96));
        assert_eq!(normalized_score(&a, &[1.0]), 0.0);
    }

    #[test]
    fn normalize_l2_unit_magnitude() {
        let n = normalize_l2(&[3.0, 4.0]);
        assert!(approx_eq(n[0], 0.6));
        assert!(approx_eq(n[1], 0.8));
        assert_eq!(normalize_l2(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert!(normalize_l2(&[]).is_empty());
    }
}
