//! Calibration report, coverage metrics, and vetoes

use super::stats::TensorStats;
use crate::fault::{FaultCode, FaultSet};
use crate::hash::DIGEST_LEN;
use serde::{Deserialize, Serialize};

/// Calibration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrateConfig {
    /// Minimum acceptable C_min across all tensors
    pub coverage_min_threshold: f32,
    /// Minimum acceptable C_p10
    pub coverage_p10_threshold: f32,
    /// Absolute range width below which a tensor is degenerate
    pub degenerate_epsilon: f32,
    /// Minimum calibration samples for a meaningful report
    pub min_samples: u32,
}

impl Default for CalibrateConfig {
    fn default() -> Self {
        Self {
            coverage_min_threshold: 0.90,
            coverage_p10_threshold: 0.95,
            degenerate_epsilon: 1e-7,
            min_samples: 100,
        }
    }
}

/// Serializable calibration digest, hashed into the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDigest {
    pub dataset_hash: [u8; DIGEST_LEN],
    pub sample_count: u32,
    pub tensor_count: u32,
    pub global_coverage_min: f32,
    pub global_coverage_p10: f32,
    /// 0 = pass, 1 = veto
    pub range_veto_status: u8,
    /// 0 = pass, 1 = veto
    pub coverage_veto_status: u8,
}

impl CalibrationDigest {
    pub const BYTE_LEN: usize = 50;

    /// Fixed little-endian layout for certificate hashing.
    pub fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut out = [0u8; Self::BYTE_LEN];
        out[0..32].copy_from_slice(&self.dataset_hash);
        out[32..36].copy_from_slice(&self.sample_count.to_le_bytes());
        out[36..40].copy_from_slice(&self.tensor_count.to_le_bytes());
        out[40..44].copy_from_slice(&self.global_coverage_min.to_le_bytes());
        out[44..48].copy_from_slice(&self.global_coverage_p10.to_le_bytes());
        out[48] = self.range_veto_status;
        out[49] = self.coverage_veto_status;
        out
    }
}

/// Complete calibration report over one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// SHA-256 of the calibration dataset
    pub dataset_hash: [u8; DIGEST_LEN],
    pub sample_count: u32,
    pub tensors: Vec<TensorStats>,

    /// C_min across all tensors
    pub global_coverage_min: f32,
    /// C_p10: value at index ⌊0.1·N⌋ of the ascending sort
    pub global_coverage_p10: f32,
    pub global_coverage_mean: f32,

    /// Any tensor escaped its safe range (fail-closed)
    pub range_veto_triggered: bool,
    /// Coverage below thresholds (warning only)
    pub coverage_veto_triggered: bool,

    pub faults: FaultSet,
}

impl CalibrationReport {
    pub fn new(dataset_hash: [u8; DIGEST_LEN], tensors: Vec<TensorStats>) -> Self {
        Self {
            dataset_hash,
            sample_count: 0,
            tensors,
            global_coverage_min: 0.0,
            global_coverage_p10: 0.0,
            global_coverage_mean: 0.0,
            range_veto_triggered: false,
            coverage_veto_triggered: false,
            faults: FaultSet::new(),
        }
    }

    pub fn tensor_count(&self) -> u32 {
        self.tensors.len() as u32
    }

    /// Record that one calibration sample has been fed through all tensors.
    pub fn record_sample(&mut self) {
        self.sample_count += 1;
    }

    /// Compute per-tensor coverage and vetoes, then the global metrics.
    ///
    /// Range vetoes raise `range_exceed` and fail the report closed;
    /// the coverage veto only warns. Must be called exactly once, after all
    /// observation is finished.
    pub fn finalize(&mut self, config: &CalibrateConfig) {
        for t in &mut self.tensors {
            t.compute_coverage(config.degenerate_epsilon);
            if t.check_range_veto() {
                self.range_veto_triggered = true;
                self.faults.raise(FaultCode::RangeExceed);
            }
        }

        self.compute_global_coverage();

        if self.global_coverage_min < config.coverage_min_threshold
            || self.global_coverage_p10 < config.coverage_p10_threshold
        {
            self.coverage_veto_triggered = true;
        }
    }

    /// Global min/mean/p10 over all tensor coverage ratios.
    ///
    /// The percentile sort is the pipeline's sole per-call scratch
    /// allocation (size = tensor count).
    fn compute_global_coverage(&mut self) {
        if self.tensors.is_empty() {
            return;
        }

        let n = self.tensors.len();
        let mut coverages: Vec<f32> = Vec::with_capacity(n);
        let mut sum = 0.0f32;
        let mut min_cov = f32::MAX;

        for t in &self.tensors {
            let c = t.coverage_ratio;
            coverages.push(c);
            sum += c;
            if c < min_cov {
                min_cov = c;
            }
        }

        self.global_coverage_mean = sum / n as f32;
        self.global_coverage_min = min_cov;

        coverages.sort_by(|a, b| a.partial_cmp(b).expect("coverage ratios are finite"));
        let p10_idx = ((n as f32) * 0.1) as usize;
        self.global_coverage_p10 = coverages[p10_idx.min(n - 1)];
    }

    /// Fail-closed predicate: no tensor escaped its safe range.
    pub fn passed(&self) -> bool {
        !self.range_veto_triggered
    }

    /// Strict predicate: range veto clear AND coverage thresholds met.
    pub fn passed_full(&self) -> bool {
        self.passed() && !self.coverage_veto_triggered
    }

    /// Caller policy check: enough samples were observed for the report to
    /// be meaningful.
    pub fn has_min_samples(&self, config: &CalibrateConfig) -> bool {
        self.sample_count >= config.min_samples
    }

    /// Generate the digest for certificate assembly.
    pub fn digest(&self) -> CalibrationDigest {
        CalibrationDigest {
            dataset_hash: self.dataset_hash,
            sample_count: self.sample_count,
            tensor_count: self.tensor_count(),
            global_coverage_min: self.global_coverage_min,
            global_coverage_p10: self.global_coverage_p10,
            range_veto_status: self.range_veto_triggered as u8,
            coverage_veto_status: self.coverage_veto_triggered as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn tensor_with_range(id: u32, obs: (f32, f32), safe: (f32, f32)) -> TensorStats {
        let mut t = TensorStats::new(id, 0, safe.0, safe.1);
        t.observe(&[obs.0, obs.1]);
        t
    }

    #[test]
    fn test_range_veto_fails_closed() {
        // Spec scenario: safe [-1, 1], observed [0, 1.5]
        let tensors = vec![tensor_with_range(0, (0.0, 1.5), (-1.0, 1.0))];
        let mut report = CalibrationReport::new([0u8; 32], tensors);
        report.finalize(&CalibrateConfig::default());

        assert!(report.range_veto_triggered);
        assert!(report.faults.range_exceed());
        assert!(!report.passed());
        assert!(!report.passed_full());
    }

    #[test]
    fn test_contained_ranges_pass() {
        let tensors = vec![
            tensor_with_range(0, (-0.99, 0.99), (-1.0, 1.0)),
            tensor_with_range(1, (-0.97, 0.98), (-1.0, 1.0)),
        ];
        let mut report = CalibrationReport::new([0u8; 32], tensors);
        report.finalize(&CalibrateConfig::default());

        assert!(!report.range_veto_triggered);
        assert!(report.passed());
        assert!(!report.faults.has_any());
    }

    #[test]
    fn test_coverage_veto_is_warning_only() {
        // Half coverage: below both thresholds, but range contained
        let tensors = vec![tensor_with_range(0, (-0.5, 0.5), (-1.0, 1.0))];
        let mut report = CalibrationReport::new([0u8; 32], tensors);
        report.finalize(&CalibrateConfig::default());

        assert!(report.coverage_veto_triggered);
        assert!(report.passed());
        assert!(!report.passed_full());
        // No fault raised: coverage veto is not a fault
        assert!(!report.faults.has_any());
    }

    #[test]
    fn test_global_metrics() {
        let tensors = vec![
            tensor_with_range(0, (-0.5, 0.5), (-1.0, 1.0)),  // 0.5
            tensor_with_range(1, (-1.0, 1.0), (-1.0, 1.0)),  // 1.0
            tensor_with_range(2, (-0.75, 0.75), (-1.0, 1.0)), // 0.75
        ];
        let mut report = CalibrationReport::new([0u8; 32], tensors);
        report.finalize(&CalibrateConfig::default());

        assert_abs_diff_eq!(report.global_coverage_min, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(report.global_coverage_mean, 0.75, epsilon = 1e-6);
        // N = 3: p10 index = floor(0.3) = 0, the smallest value
        assert_abs_diff_eq!(report.global_coverage_p10, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_p10_index_clamps() {
        let tensors = vec![tensor_with_range(0, (-1.0, 1.0), (-1.0, 1.0))];
        let mut report = CalibrationReport::new([0u8; 32], tensors);
        report.finalize(&CalibrateConfig::default());
        assert_abs_diff_eq!(report.global_coverage_p10, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_p10_with_many_tensors() {
        // 20 tensors, coverage 0.05·(id+1): sorted ascending, index 2
        let tensors: Vec<TensorStats> = (0..20)
            .map(|i| {
                let half = 0.05 * (i + 1) as f32 / 2.0;
                tensor_with_range(i as u32, (-half, half), (-0.5, 0.5))
            })
            .collect();
        let mut report = CalibrationReport::new([0u8; 32], tensors);
        report.finalize(&CalibrateConfig::default());
        assert_abs_diff_eq!(report.global_coverage_p10, 0.15, epsilon = 1e-5);
    }

    #[test]
    fn test_degenerate_tensor_counts_as_full_coverage() {
        let mut t = TensorStats::new(0, 0, -1.0, 1.0);
        t.observe(&[0.25; 8]);
        let mut report = CalibrationReport::new([0u8; 32], vec![t]);
        report.finalize(&CalibrateConfig::default());

        assert!(report.tensors[0].is_degenerate);
        assert_abs_diff_eq!(report.global_coverage_min, 1.0);
        assert!(report.passed_full());
    }

    #[test]
    fn test_min_samples_policy() {
        let config = CalibrateConfig::default();
        let tensors = vec![tensor_with_range(0, (-1.0, 1.0), (-1.0, 1.0))];
        let mut report = CalibrationReport::new([0u8; 32], tensors);
        assert!(!report.has_min_samples(&config));

        for _ in 0..100 {
            report.record_sample();
        }
        assert!(report.has_min_samples(&config));
    }

    #[test]
    fn test_digest_reflects_report() {
        let tensors = vec![tensor_with_range(0, (0.0, 1.5), (-1.0, 1.0))];
        let mut report = CalibrationReport::new([7u8; 32], tensors);
        report.record_sample();
        report.record_sample();
        report.finalize(&CalibrateConfig::default());

        let d = report.digest();
        assert_eq!(d.dataset_hash, [7u8; 32]);
        assert_eq!(d.sample_count, 2);
        assert_eq!(d.tensor_count, 1);
        assert_eq!(d.range_veto_status, 1);
    }

    #[test]
    fn test_digest_bytes_layout() {
        let tensors = vec![tensor_with_range(0, (-1.0, 1.0), (-1.0, 1.0))];
        let mut report = CalibrationReport::new([3u8; 32], tensors);
        report.finalize(&CalibrateConfig::default());

        let bytes = report.digest().to_bytes();
        assert_eq!(bytes.len(), CalibrationDigest::BYTE_LEN);
        assert_eq!(&bytes[0..32], &[3u8; 32]);
        assert_eq!(bytes[48], 0); // range veto clear
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Global min never exceeds mean, and p10 sits between them.
        #[test]
        fn prop_global_metric_ordering(
            halves in prop::collection::vec(0.01f32..0.5, 1..30),
        ) {
            let tensors: Vec<TensorStats> = halves
                .iter()
                .enumerate()
                .map(|(i, &h)| tensor_with_range(i as u32, (-h, h), (-0.5, 0.5)))
                .collect();
            let mut report = CalibrationReport::new([0u8; 32], tensors);
            report.finalize(&CalibrateConfig::default());

            prop_assert!(report.global_coverage_min <= report.global_coverage_mean + 1e-6);
            prop_assert!(report.global_coverage_p10 >= report.global_coverage_min - 1e-6);
        }

        /// passed() is exactly the negation of the range veto.
        #[test]
        fn prop_passed_iff_no_range_veto(
            obs_hi in 0.5f32..2.0,
        ) {
            let tensors = vec![tensor_with_range(0, (-0.5, obs_hi), (-1.0, 1.0))];
            let mut report = CalibrationReport::new([0u8; 32], tensors);
            report.finalize(&CalibrateConfig::default());
            prop_assert_eq!(report.passed(), obs_hi <= 1.0);
        }
    }
}
