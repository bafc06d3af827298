//! Per-tensor observed range statistics

use serde::{Deserialize, Serialize};

/// Observed statistics for a single tensor.
///
/// The observed range starts at [+∞, −∞] so the first finite sample
/// initializes both bounds. NaN and ±∞ samples are skipped with no state
/// change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorStats {
    pub tensor_id: u32,
    /// Parent layer index
    pub layer_index: u32,

    /// L_obs
    pub min_observed: f32,
    /// U_obs
    pub max_observed: f32,

    /// L_safe, inherited from analysis
    pub min_safe: f32,
    /// U_safe
    pub max_safe: f32,

    /// C_t = (U_obs − L_obs) / (U_safe − L_safe)
    pub coverage_ratio: f32,
    /// Observed or safe range narrower than ε_degenerate
    pub is_degenerate: bool,
    /// Observed range escaped the safe range
    pub range_veto: bool,
}

impl TensorStats {
    pub fn new(tensor_id: u32, layer_index: u32, min_safe: f32, max_safe: f32) -> Self {
        Self {
            tensor_id,
            layer_index,
            min_observed: f32::INFINITY,
            max_observed: f32::NEG_INFINITY,
            min_safe,
            max_safe,
            coverage_ratio: 0.0,
            is_degenerate: false,
            range_veto: false,
        }
    }

    /// Fold a batch of samples into the observed range.
    pub fn observe(&mut self, samples: &[f32]) {
        for &v in samples {
            self.observe_one(v);
        }
    }

    /// Fold a single sample into the observed range.
    pub fn observe_one(&mut self, value: f32) {
        if value.is_nan() || value.is_infinite() {
            return;
        }
        if value < self.min_observed {
            self.min_observed = value;
        }
        if value > self.max_observed {
            self.max_observed = value;
        }
    }

    /// True once at least one finite sample has been observed.
    pub fn has_observations(&self) -> bool {
        self.min_observed <= self.max_observed
    }

    /// Compute the coverage ratio, handling degenerate ranges.
    ///
    /// If either the observed or the safe range is narrower than `epsilon`
    /// in absolute width, the tensor is degenerate and C_t is defined as 1.
    pub fn compute_coverage(&mut self, epsilon: f32) {
        let observed_range = self.max_observed - self.min_observed;
        let safe_range = self.max_safe - self.min_safe;

        if observed_range.abs() < epsilon || safe_range.abs() < epsilon {
            self.is_degenerate = true;
            self.coverage_ratio = 1.0;
            return;
        }

        self.is_degenerate = false;
        self.coverage_ratio = observed_range / safe_range;
    }

    /// Fail-closed range check: veto when the observed range escapes the
    /// claimed safe range. Returns whether the veto fired.
    pub fn check_range_veto(&mut self) -> bool {
        self.range_veto = self.min_observed < self.min_safe || self.max_observed > self.max_safe;
        self.range_veto
    }
}
