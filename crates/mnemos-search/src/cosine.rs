//! Cosine similarity.

/// Cosine similarity of two vectors, in [-1, 1].
///
/// Returns 0.0 when the dimensions differ or either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn samples() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.3, -0.7, 2.5],
            vec![-4.0, 1.5, 0.25],
            vec![1e-3, 2e-3, -5e-4],
            vec![12.0, 12.0, 12.0],
        ]
    }

    #[test]
    fn test_self_similarity_is_one() {
        for v in samples() {
            assert!((cosine_similarity(&v, &v) - 1.0).abs() < EPS, "{:?}", v);
        }
    }

    #[test]
    fn test_opposite_is_minus_one() {
        for v in samples() {
            let neg: Vec<f32> = v.iter().map(|x| -x).collect();
            assert!((cosine_similarity(&v, &neg) + 1.0).abs() < EPS, "{:?}", v);
        }
    }

    #[test]
    fn test_symmetric() {
        let vs = samples();
        for a in &vs {
            for b in &vs {
                assert_eq!(cosine_similarity(a, b), cosine_similarity(b, a));
            }
        }
    }

    #[test]
    fn test_orthogonal_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < EPS);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
