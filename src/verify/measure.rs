//! L∞ deviation measurement

use crate::dvm::{q16_to_f64, Fixed16};

/// L∞ norm of the deviation between two float arrays:
/// `max_i |a[i] − b[i]|` in f64. Empty or length-mismatched prefixes
/// compare only the common prefix; empty inputs return 0.
pub fn linf_norm(a: &[f32], b: &[f32]) -> f64 {
    let mut max_diff = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let diff = (x as f64 - y as f64).abs();
        if diff > max_diff {
            max_diff = diff;
        }
    }
    max_diff
}

/// L∞ norm between an FP32 reference and a Q16.16 array, decoding the
/// fixed-point encoding before comparison.
pub fn linf_norm_q16(fp: &[f32], q16: &[Fixed16]) -> f64 {
    let mut max_diff = 0.0f64;
    for (&x, &q) in fp.iter().zip(q16.iter()) {
        let diff = (x as f64 - q16_to_f64(q)).abs();
        if diff > max_diff {
            max_diff = diff;
        }
    }
    max_diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dvm::Q16_ONE;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_linf_identical_arrays() {
        let a = [1.0f32, -2.0, 3.0];
        assert_relative_eq!(linf_norm(&a, &a), 0.0);
    }

    #[test]
    fn test_linf_picks_maximum() {
        let a = [1.0f32, 2.0, 3.0];
        let b = [1.1f32, 1.5, 3.0];
        assert_relative_eq!(linf_norm(&a, &b), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_linf_empty_is_zero() {
        assert_relative_eq!(linf_norm(&[], &[]), 0.0);
        assert_relative_eq!(linf_norm(&[1.0], &[]), 0.0);
    }

    #[test]
    fn test_linf_q16_decodes() {
        let fp = [1.0f32, -0.5];
        let q = [Q16_ONE, -Q16_ONE / 2];
        assert_relative_eq!(linf_norm_q16(&fp, &q), 0.0);

        let q_off = [Q16_ONE + 1, -Q16_ONE / 2];
        assert_relative_eq!(linf_norm_q16(&fp, &q_off), 1.0 / 65536.0, epsilon = 1e-12);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        /// L∞ is symmetric and non-negative.
        #[test]
        fn prop_linf_symmetric(
            a in prop::collection::vec(-100.0f32..100.0, 0..50),
            b in prop::collection::vec(-100.0f32..100.0, 0..50),
        ) {
            let d1 = linf_norm(&a, &b);
            let d2 = linf_norm(&b, &a);
            prop_assert_eq!(d1.to_bits(), d2.to_bits());
            prop_assert!(d1 >= 0.0);
        }

        /// L∞ dominates every pointwise deviation.
        #[test]
        fn prop_linf_dominates_pointwise(
            pairs in prop::collection::vec((-100.0f32..100.0, -100.0f32..100.0), 1..50),
        ) {
            let a: Vec<f32> = pairs.iter().map(|p| p.0).collect();
            let b: Vec<f32> = pairs.iter().map(|p| p.1).collect();
            let d = linf_norm(&a, &b);
            for (&x, &y) in a.iter().zip(b.iter()) {
                prop_assert!((x as f64 - y as f64).abs() <= d);
            }
        }

        /// Triangle inequality through a midpoint array.
        #[test]
        fn prop_linf_triangle(
            triples in prop::collection::vec(
                (-100.0f32..100.0, -100.0f32..100.0, -100.0f32..100.0), 1..30),
        ) {
            let a: Vec<f32> = triples.iter().map(|t| t.0).collect();
            let b: Vec<f32> = triples.iter().map(|t| t.1).collect();
            let c: Vec<f32> = triples.iter().map(|t| t.2).collect();
            prop_assert!(linf_norm(&a, &c) <= linf_norm(&a, &b) + linf_norm(&b, &c) + 1e-9);
        }
    }
}
