//! Analysis context, recurrence driver, and digest

use super::contract::{
    apply_error_recurrence, compute_error_contributions, compute_overflow_proof, entry_error,
    LayerContract, LayerType,
};
use super::norms::frobenius_norm;
use super::range::{propagate_linear, propagate_relu, weight_range, Range};
use crate::dvm::{scale_from_exp, FixedFormat, ScaleExp};
use crate::error::{Error, Result};
use crate::fault::{FaultCode, FaultSet};
use crate::hash::{Sha256Stream, DIGEST_LEN};
use serde::{Deserialize, Serialize};

/// Analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeConfig {
    /// Input quantization scale exponent (S_in = 2^exp)
    pub input_scale_exp: ScaleExp,
    /// Default weight scale exponent
    pub default_weight_exp: ScaleExp,
    /// Default output scale exponent
    pub default_output_exp: ScaleExp,
    pub target_format: FixedFormat,
    /// Allow Q8.24 for sensitive layers
    pub allow_mixed_precision: bool,
    /// Allow chunked accumulation
    pub allow_chunked_accum: bool,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            input_scale_exp: 16,
            default_weight_exp: 16,
            default_output_exp: 16,
            target_format: FixedFormat::Q16_16,
            allow_mixed_precision: false,
            allow_chunked_accum: false,
        }
    }
}

/// Serializable analysis digest, hashed into the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDigest {
    /// ε₀
    pub entry_error: f64,
    /// ε_total
    pub total_error_bound: f64,
    pub layer_count: u32,
    /// Layers whose overflow proof is safe
    pub overflow_safe_count: u32,
    /// SHA-256 over the canonical serialization of all layer contracts
    pub layers_hash: [u8; DIGEST_LEN],
}

impl AnalysisDigest {
    pub const BYTE_LEN: usize = 56;

    /// Fixed little-endian layout for certificate hashing.
    pub fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut out = [0u8; Self::BYTE_LEN];
        out[0..8].copy_from_slice(&self.entry_error.to_le_bytes());
        out[8..16].copy_from_slice(&self.total_error_bound.to_le_bytes());
        out[16..20].copy_from_slice(&self.layer_count.to_le_bytes());
        out[20..24].copy_from_slice(&self.overflow_safe_count.to_le_bytes());
        out[24..56].copy_from_slice(&self.layers_hash);
        out
    }
}

/// Complete analysis state for one model.
///
/// Layers are analyzed in network order; the recurrence threads each
/// contract's output bound into the next layer's input bound. The context
/// is finalized exactly once and is read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// ε₀: input ingress quantization error
    pub entry_error: f64,
    pub input_scale_exp: ScaleExp,
    pub layers: Vec<LayerContract>,
    /// ε_total: end-to-end bound
    pub total_error_bound: f64,
    pub is_complete: bool,
    pub is_valid: bool,
    pub faults: FaultSet,

    config: AnalyzeConfig,
    /// Running output range of the most recently analyzed layer
    current_range: Range,
    /// Running error bound threaded through the recurrence
    current_error: f64,
}

impl AnalysisContext {
    pub fn new(config: AnalyzeConfig) -> Self {
        let e0 = entry_error(config.input_scale_exp);
        Self {
            entry_error: e0,
            input_scale_exp: config.input_scale_exp,
            layers: Vec::new(),
            total_error_bound: 0.0,
            is_complete: false,
            is_valid: false,
            faults: FaultSet::new(),
            config,
            current_range: Range::default(),
            current_error: e0,
        }
    }

    pub fn config(&self) -> &AnalyzeConfig {
        &self.config
    }

    /// Declare the range of the network input before the first layer.
    pub fn set_input_range(&mut self, range: Range) {
        self.current_range = range;
    }

    /// Output range after the most recently analyzed layer.
    pub fn current_range(&self) -> Range {
        self.current_range
    }

    /// Analyze one linear layer: interval propagation, Frobenius
    /// amplification, overflow proof, error contributions, recurrence.
    ///
    /// `weights` is row-major `rows × cols`; fan-in is `cols`. Returns the
    /// propagated output range for inspection.
    pub fn analyze_linear(
        &mut self,
        weights: &[f32],
        rows: usize,
        cols: usize,
        bias: Option<&[f32]>,
    ) -> Result<Range> {
        if weights.len() != rows * cols {
            return Err(Error::DimensionMismatch {
                expected: rows * cols,
                got: weights.len(),
            });
        }

        let index = self.layers.len() as u32;
        let mut contract = LayerContract::new(index, LayerType::Linear, cols as u32, rows as u32);

        contract.weight_range = weight_range(weights);
        contract.input_range = self.current_range;

        let bias_range = bias.map(weight_range);
        contract.output_range = propagate_linear(
            &self.current_range,
            &contract.weight_range,
            bias_range.as_ref(),
            cols as u32,
        );

        contract.amp_factor = frobenius_norm(weights, rows, cols);

        let w_scale = scale_from_exp(self.config.default_weight_exp);
        let x_scale = scale_from_exp(self.input_scale_exp);
        let out_scale = scale_from_exp(self.config.default_output_exp);

        // Integer magnitudes for the accumulator proof: worst-case fixed
        // point encodings of the float magnitudes, rounded up.
        let w_mag = (contract.weight_range.magnitude() * w_scale).ceil();
        let x_mag = (self.current_range.magnitude() * x_scale).ceil();
        contract.overflow_proof = compute_overflow_proof(
            saturate_u32(w_mag),
            saturate_u32(x_mag),
            cols as u32,
        );

        compute_error_contributions(
            &mut contract,
            w_scale,
            x_scale,
            out_scale,
            self.current_range.magnitude(),
        );
        apply_error_recurrence(&mut contract, self.current_error);

        self.current_error = contract.output_error_bound;
        self.current_range = contract.output_range;
        self.layers.push(contract);
        Ok(self.current_range)
    }

    /// Analyze a ReLU layer: identity amplification, no local error.
    pub fn analyze_relu(&mut self) -> Range {
        let index = self.layers.len() as u32;
        let mut contract = LayerContract::new(index, LayerType::Relu, 0, 0);

        contract.input_range = self.current_range;
        contract.output_range = propagate_relu(&self.current_range);
        contract.amp_factor = 1.0;
        contract.overflow_proof = compute_overflow_proof(0, 0, 0);
        apply_error_recurrence(&mut contract, self.current_error);

        self.current_error = contract.output_error_bound;
        self.current_range = contract.output_range;
        self.layers.push(contract);
        self.current_range
    }

    /// Append a contract produced outside the built-in drivers. The caller
    /// is responsible for having applied the recurrence.
    pub fn push_contract(&mut self, contract: LayerContract) {
        self.current_error = contract.output_error_bound;
        self.current_range = contract.output_range;
        self.layers.push(contract);
    }

    /// Record an asymmetric quantization spec: fatal, invalidates the
    /// context; no digest can be generated.
    pub fn record_asymmetric(&mut self) {
        self.faults.raise(FaultCode::AsymmetricParams);
        self.is_valid = false;
        self.is_complete = false;
    }

    /// Record an unfolded BatchNorm: fatal.
    pub fn record_unfolded_bn(&mut self) {
        self.faults.raise(FaultCode::UnfoldedBn);
        self.is_valid = false;
        self.is_complete = false;
    }

    /// Compute the total error bound and seal the context.
    ///
    /// With zero layers the total is ε₀. Validity requires every contract
    /// to have gone through the recurrence; a previously recorded fatal
    /// fault keeps the context invalid.
    pub fn finalize(&mut self) {
        if self.faults.has_fatal() {
            self.is_valid = false;
            self.is_complete = false;
            return;
        }

        if self.layers.is_empty() {
            self.total_error_bound = self.entry_error;
        } else {
            self.total_error_bound = self.layers[self.layers.len() - 1].output_error_bound;
        }

        self.is_valid = self.layers.iter().all(|l| l.is_valid);
        self.is_complete = true;
    }

    /// Analysis passed: complete, valid, no fatal fault.
    pub fn passed(&self) -> bool {
        self.is_complete && self.is_valid && !self.faults.has_fatal()
    }

    /// Generate the digest for certificate assembly.
    pub fn digest(&self) -> Result<AnalysisDigest> {
        if !self.is_complete || !self.is_valid {
            return Err(Error::NotBuildable("analysis context incomplete or invalid"));
        }

        let overflow_safe_count = self
            .layers
            .iter()
            .filter(|l| l.overflow_proof.is_safe)
            .count() as u32;

        let layers_hash = if self.layers.is_empty() {
            [0u8; DIGEST_LEN]
        } else {
            let mut stream = Sha256Stream::new();
            let mut buf = Vec::new();
            for layer in &self.layers {
                buf.clear();
                layer.write_canonical(&mut buf);
                stream.update(&buf);
            }
            stream.finalize()
        };

        Ok(AnalysisDigest {
            entry_error: self.entry_error,
            total_error_bound: self.total_error_bound,
            layer_count: self.layers.len() as u32,
            overflow_safe_count,
            layers_hash,
        })
    }
}

fn saturate_u32(v: f64) -> u32 {
    if v >= u32::MAX as f64 {
        u32::MAX
    } else if v <= 0.0 {
        0
    } else {
        v as u32
    }
}
