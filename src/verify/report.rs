//! Verification report, statistics, and bound checking

use crate::error::{Error, Result};
use crate::fault::{FaultCode, FaultSet};
use crate::hash::DIGEST_LEN;
use serde::{Deserialize, Serialize};

/// Verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Minimum samples for a valid verification
    pub min_samples: u32,
    /// Maximum samples to process
    pub max_samples: u32,
    /// Capture per-layer activations
    pub capture_intermediates: bool,
    /// Fail on the first bound violation instead of surveying all layers
    pub strict_mode: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            min_samples: 100,
            max_samples: 1000,
            capture_intermediates: true,
            strict_mode: false,
        }
    }
}

/// Per-layer comparison between measured and theoretical error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerComparison {
    pub layer_index: u32,
    pub sample_count: u32,

    /// Maximum measured error (L∞ over all samples)
    pub error_max_measured: f64,
    pub error_mean_measured: f64,
    pub error_std_measured: f64,

    /// ε_l from analysis
    pub error_bound_theoretical: f64,

    // Running reductions, folded in sample order
    error_sum: f64,
    error_sum_sq: f64,

    /// max_measured ≤ theoretical (exact equality counts)
    pub bound_satisfied: bool,
}

impl LayerComparison {
    pub fn new(layer_index: u32, bound: f64) -> Self {
        Self {
            layer_index,
            error_bound_theoretical: bound,
            ..Default::default()
        }
    }

    /// Fold one sample's measured error into the running statistics.
    pub fn update(&mut self, error: f64) {
        self.sample_count += 1;
        if error > self.error_max_measured {
            self.error_max_measured = error;
        }
        self.error_sum += error;
        self.error_sum_sq += error * error;
    }

    /// Compute mean and population std from the running sums. Negative
    /// variance from cancellation clamps to zero.
    pub fn finalize(&mut self) {
        if self.sample_count == 0 {
            return;
        }
        let n = self.sample_count as f64;
        self.error_mean_measured = self.error_sum / n;
        let mean_sq = self.error_mean_measured * self.error_mean_measured;
        let variance = (self.error_sum_sq / n - mean_sq).max(0.0);
        self.error_std_measured = variance.sqrt();
    }

    /// Check the layer bound, raising `bound_violation` on failure.
    pub fn check_bounds(&mut self, faults: &mut FaultSet) -> bool {
        if self.error_max_measured > self.error_bound_theoretical {
            self.bound_satisfied = false;
            faults.raise(FaultCode::BoundViolation);
            return false;
        }
        self.bound_satisfied = true;
        true
    }
}

/// Serializable verification digest, hashed into the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerificationDigest {
    pub dataset_hash: [u8; DIGEST_LEN],
    pub sample_count: u32,
    /// Layers whose bound held
    pub layers_passed: u32,
    /// ε_total claimed
    pub total_error_theoretical: f64,
    /// ε_max measured
    pub total_error_max_measured: f64,
    /// 1 ⇔ every layer bound AND the total bound held
    pub bounds_satisfied: u8,
}

impl VerificationDigest {
    pub const BYTE_LEN: usize = 57;

    /// Fixed little-endian layout for certificate hashing.
    pub fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut out = [0u8; Self::BYTE_LEN];
        out[0..32].copy_from_slice(&self.dataset_hash);
        out[32..36].copy_from_slice(&self.sample_count.to_le_bytes());
        out[36..40].copy_from_slice(&self.layers_passed.to_le_bytes());
        out[40..48].copy_from_slice(&self.total_error_theoretical.to_le_bytes());
        out[48..56].copy_from_slice(&self.total_error_max_measured.to_le_bytes());
        out[56] = self.bounds_satisfied;
        out
    }
}

/// Complete verification report over one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// SHA-256 of the verification dataset
    pub dataset_hash: [u8; DIGEST_LEN],
    pub sample_count: u32,
    pub layers: Vec<LayerComparison>,

    /// ε_total from analysis
    pub total_error_theoretical: f64,
    pub total_error_max_measured: f64,
    pub total_error_mean: f64,
    pub total_error_std: f64,

    total_error_sum: f64,
    total_error_sum_sq: f64,

    pub all_bounds_satisfied: bool,
    pub total_bound_satisfied: bool,

    pub faults: FaultSet,
}

impl VerificationReport {
    pub fn new(
        dataset_hash: [u8; DIGEST_LEN],
        layers: Vec<LayerComparison>,
        total_bound: f64,
    ) -> Self {
        Self {
            dataset_hash,
            sample_count: 0,
            layers,
            total_error_theoretical: total_bound,
            total_error_max_measured: 0.0,
            total_error_mean: 0.0,
            total_error_std: 0.0,
            total_error_sum: 0.0,
            total_error_sum_sq: 0.0,
            all_bounds_satisfied: false,
            total_bound_satisfied: false,
            faults: FaultSet::new(),
        }
    }

    /// Fold one sample's end-to-end error into the running statistics.
    pub fn update_total(&mut self, error: f64) {
        self.sample_count += 1;
        if error > self.total_error_max_measured {
            self.total_error_max_measured = error;
        }
        self.total_error_sum += error;
        self.total_error_sum_sq += error * error;
    }

    /// Finalize end-to-end statistics.
    pub fn finalize_total(&mut self) {
        if self.sample_count == 0 {
            return;
        }
        let n = self.sample_count as f64;
        self.total_error_mean = self.total_error_sum / n;
        let mean_sq = self.total_error_mean * self.total_error_mean;
        let variance = (self.total_error_sum_sq / n - mean_sq).max(0.0);
        self.total_error_std = variance.sqrt();
    }

    /// Check every layer bound and the total bound.
    ///
    /// Layer checking continues past failures so the report exposes every
    /// failing layer. Any violation raises `bound_violation` and returns
    /// the failure.
    pub fn check_all_bounds(&mut self) -> Result<()> {
        let mut violated = false;

        self.all_bounds_satisfied = true;
        for layer in &mut self.layers {
            if !layer.check_bounds(&mut self.faults) {
                self.all_bounds_satisfied = false;
                violated = true;
            }
        }

        if self.total_error_max_measured > self.total_error_theoretical {
            self.total_bound_satisfied = false;
            self.faults.raise(FaultCode::BoundViolation);
            violated = true;
        } else {
            self.total_bound_satisfied = true;
        }

        if violated {
            return Err(Error::FaultRaised(FaultCode::BoundViolation));
        }
        Ok(())
    }

    /// Verification passed: all layer bounds and the total bound held.
    pub fn passed(&self) -> bool {
        self.all_bounds_satisfied && self.total_bound_satisfied
    }

    /// Caller policy check: the sample count sits inside the configured
    /// window.
    pub fn sample_policy_ok(&self, config: &VerifyConfig) -> bool {
        self.sample_count >= config.min_samples && self.sample_count <= config.max_samples
    }

    /// Generate the digest for certificate assembly.
    pub fn digest(&self) -> VerificationDigest {
        let layers_passed = self.layers.iter().filter(|l| l.bound_satisfied).count() as u32;
        VerificationDigest {
            dataset_hash: self.dataset_hash,
            sample_count: self.sample_count,
            layers_passed,
            total_error_theoretical: self.total_error_theoretical,
            total_error_max_measured: self.total_error_max_measured,
            bounds_satisfied: self.passed() as u8,
        }
    }
}
