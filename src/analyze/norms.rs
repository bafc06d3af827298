//! Operator norms for amplification bounds
//!
//! Both norms reduce in f64 over row-major, left-to-right order. The order
//! is load-bearing: it is what makes the analysis digest byte-identical
//! across platforms.

/// Frobenius norm ‖W‖_F = √(Σᵢⱼ wᵢⱼ²). The default amplification bound.
pub fn frobenius_norm(weights: &[f32], rows: usize, cols: usize) -> f64 {
    if weights.is_empty() || rows == 0 || cols == 0 {
        return 0.0;
    }

    let count = rows * cols;
    let mut sum_sq = 0.0f64;
    for &w in &weights[..count] {
        let w = w as f64;
        sum_sq += w * w;
    }

    sum_sq.sqrt()
}

/// Row-sum norm (L∞-induced): maxᵢ Σⱼ |wᵢⱼ|.
pub fn row_sum_norm(weights: &[f32], rows: usize, cols: usize) -> f64 {
    if weights.is_empty() || rows == 0 || cols == 0 {
        return 0.0;
    }

    let mut max_row_sum = 0.0f64;
    for i in 0..rows {
        let mut row_sum = 0.0f64;
        for j in 0..cols {
            row_sum += (weights[i * cols + j] as f64).abs();
        }
        if row_sum > max_row_sum {
            max_row_sum = row_sum;
        }
    }

    max_row_sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_frobenius_identity_matrix() {
        // 2x2 identity: sqrt(1 + 0 + 0 + 1) = sqrt(2)
        let w = [1.0, 0.0, 0.0, 1.0];
        assert_relative_eq!(frobenius_norm(&w, 2, 2), 2.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_frobenius_3_4_5() {
        let w = [3.0, 4.0];
        assert_relative_eq!(frobenius_norm(&w, 1, 2), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_frobenius_empty() {
        assert_relative_eq!(frobenius_norm(&[], 0, 0), 0.0);
        assert_relative_eq!(frobenius_norm(&[1.0], 0, 1), 0.0);
    }

    #[test]
    fn test_row_sum_norm() {
        // Rows: |1|+|-2| = 3, |0.5|+|0.5| = 1
        let w = [1.0, -2.0, 0.5, 0.5];
        assert_relative_eq!(row_sum_norm(&w, 2, 2), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_row_sum_single_row() {
        let w = [1.0, -1.0, 1.0];
        assert_relative_eq!(row_sum_norm(&w, 1, 3), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_norms_deterministic_repeat() {
        let w: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin()).collect();
        let a = frobenius_norm(&w, 8, 8);
        let b = frobenius_norm(&w, 8, 8);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Both norms are non-negative.
        #[test]
        fn prop_norms_non_negative(
            w in prop::collection::vec(-100.0f32..100.0, 1..64),
        ) {
            let cols = w.len();
            prop_assert!(frobenius_norm(&w, 1, cols) >= 0.0);
            prop_assert!(row_sum_norm(&w, 1, cols) >= 0.0);
        }

        /// Frobenius dominates the max element magnitude.
        #[test]
        fn prop_frobenius_dominates_max_abs(
            w in prop::collection::vec(-100.0f32..100.0, 1..64),
        ) {
            let cols = w.len();
            let max_abs = w.iter().map(|v| v.abs() as f64).fold(0.0, f64::max);
            prop_assert!(frobenius_norm(&w, 1, cols) >= max_abs - 1e-9);
        }

        /// Scaling the matrix scales both norms linearly.
        #[test]
        fn prop_norms_absolutely_homogeneous(
            w in prop::collection::vec(-10.0f32..10.0, 4..32),
            k in 0.1f32..8.0,
        ) {
            let cols = w.len();
            let scaled: Vec<f32> = w.iter().map(|v| v * k).collect();
            let f1 = frobenius_norm(&w, 1, cols);
            let f2 = frobenius_norm(&scaled, 1, cols);
            prop_assert!((f2 - k as f64 * f1).abs() <= 1e-3 * f1.max(1.0));
        }
    }
}
