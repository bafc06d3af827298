//! Per-layer error contracts and overflow proofs

use super::range::Range;
use serde::{Deserialize, Serialize};

/// Layer type enumeration. Wire values appear in layer headers and in the
/// canonical contract serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[repr(u32)]
pub enum LayerType {
    #[default]
    Linear = 0,
    Conv2d = 1,
    Relu = 2,
    Softmax = 3,
    MaxPool = 4,
    AvgPool = 5,
}

impl LayerType {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(LayerType::Linear),
            1 => Some(LayerType::Conv2d),
            2 => Some(LayerType::Relu),
            3 => Some(LayerType::Softmax),
            4 => Some(LayerType::MaxPool),
            5 => Some(LayerType::AvgPool),
            _ => None,
        }
    }
}

/// Static proof that a layer's MAC accumulation cannot overflow the 64-bit
/// accumulator: `is_safe ⇔ n·w·x < 2⁶³` in exact integer arithmetic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverflowProof {
    /// Maximum weight magnitude (integer representation)
    pub max_weight_mag: u32,
    /// Maximum input magnitude (integer representation)
    pub max_input_mag: u32,
    /// Fan-in (number of MAC operations)
    pub dot_product_len: u32,
    /// Distance from the worst-case product to 2⁶³ (0 when unsafe)
    pub safety_margin: u64,
    pub is_safe: bool,
}

/// Safety limit for the accumulator: worst-case |product| must stay below
/// 2⁶³.
const ACCUM_LIMIT: u64 = 1u64 << 63;

/// Compute the overflow proof for `(max_weight_mag, max_input_mag,
/// dot_product_len)`.
///
/// Any zero factor makes the product trivially safe with maximal margin.
/// The staged u64 checks keep the computation itself exact even when the
/// true product exceeds u64 range.
pub fn compute_overflow_proof(
    max_weight_mag: u32,
    max_input_mag: u32,
    dot_product_len: u32,
) -> OverflowProof {
    let mut proof = OverflowProof {
        max_weight_mag,
        max_input_mag,
        dot_product_len,
        safety_margin: 0,
        is_safe: false,
    };

    let n = dot_product_len as u64;
    let w = max_weight_mag as u64;
    let x = max_input_mag as u64;

    if n == 0 || w == 0 || x == 0 {
        proof.safety_margin = ACCUM_LIMIT;
        proof.is_safe = true;
        return proof;
    }

    let nw = match n.checked_mul(w) {
        Some(nw) => nw,
        None => return proof,
    };
    let product = match nw.checked_mul(x) {
        Some(p) => p,
        None => return proof,
    };

    if product < ACCUM_LIMIT {
        proof.safety_margin = ACCUM_LIMIT - product;
        proof.is_safe = true;
    }

    proof
}

/// Entry (ingress) quantization error ε₀ = 1/(2·S_in) with S_in = 2^exp.
pub fn entry_error(input_scale_exp: i8) -> f64 {
    0.5 / f64::powi(2.0, input_scale_exp as i32)
}

/// Error contract for a single layer.
///
/// `amp_factor` is an operator-norm upper bound (≥ 0; identity maps take 1).
/// `output_error_bound` may equal `input_error_bound` when the layer is an
/// exact identity, otherwise it grows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerContract {
    pub layer_index: u32,
    pub layer_type: LayerType,
    pub fan_in: u32,
    pub fan_out: u32,

    pub weight_range: Range,
    pub input_range: Range,
    pub output_range: Range,

    /// A_l = ‖W_l‖ (operator norm upper bound)
    pub amp_factor: f64,

    /// (1/(2·S_w)) · ‖x‖_max
    pub weight_error_contrib: f64,
    /// 1/(2·S_w·S_x)
    pub bias_error_contrib: f64,
    /// 1/(2·S_out), the requantization step
    pub projection_error: f64,
    pub local_error_sum: f64,

    /// ε_l, inherited from the previous layer
    pub input_error_bound: f64,
    /// ε_{l+1} = A_l·ε_l + local_error_sum
    pub output_error_bound: f64,

    pub overflow_proof: OverflowProof,
    pub is_valid: bool,
}

impl LayerContract {
    pub fn new(layer_index: u32, layer_type: LayerType, fan_in: u32, fan_out: u32) -> Self {
        Self {
            layer_index,
            layer_type,
            fan_in,
            fan_out,
            amp_factor: 1.0,
            ..Default::default()
        }
    }

    /// Canonical little-endian serialization used by the analysis digest.
    /// Fixed field order, no padding; 142 bytes per contract.
    pub fn write_canonical(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.layer_index.to_le_bytes());
        out.extend_from_slice(&(self.layer_type as u32).to_le_bytes());
        out.extend_from_slice(&self.fan_in.to_le_bytes());
        out.extend_from_slice(&self.fan_out.to_le_bytes());
        for r in [&self.weight_range, &self.input_range, &self.output_range] {
            out.extend_from_slice(&r.min_val.to_le_bytes());
            out.extend_from_slice(&r.max_val.to_le_bytes());
        }
        out.extend_from_slice(&self.amp_factor.to_le_bytes());
        out.extend_from_slice(&self.weight_error_contrib.to_le_bytes());
        out.extend_from_slice(&self.bias_error_contrib.to_le_bytes());
        out.extend_from_slice(&self.projection_error.to_le_bytes());
        out.extend_from_slice(&self.local_error_sum.to_le_bytes());
        out.extend_from_slice(&self.input_error_bound.to_le_bytes());
        out.extend_from_slice(&self.output_error_bound.to_le_bytes());
        out.extend_from_slice(&self.overflow_proof.max_weight_mag.to_le_bytes());
        out.extend_from_slice(&self.overflow_proof.max_input_mag.to_le_bytes());
        out.extend_from_slice(&self.overflow_proof.dot_product_len.to_le_bytes());
        out.extend_from_slice(&self.overflow_proof.safety_margin.to_le_bytes());
        out.push(self.overflow_proof.is_safe as u8);
        out.push(self.is_valid as u8);
    }
}

/// Populate the static error contributions of a contract.
///
/// Scales are the actual factors S = 2^exp, not exponents. `input_scale` is
/// explicit; passing `input_scale == weight_scale` reproduces the common
/// S_x = S_w encoding where the bias term reduces to 0.5/S_w².
pub fn compute_error_contributions(
    contract: &mut LayerContract,
    weight_scale: f64,
    input_scale: f64,
    output_scale: f64,
    max_input_norm: f64,
) {
    if weight_scale <= 0.0 || input_scale <= 0.0 || output_scale <= 0.0 {
        return;
    }

    contract.weight_error_contrib = (0.5 / weight_scale) * max_input_norm;
    contract.bias_error_contrib = 0.5 / (weight_scale * input_scale);
    contract.projection_error = 0.5 / output_scale;

    contract.local_error_sum = contract.weight_error_contrib
        + contract.bias_error_contrib
        + contract.projection_error;
}

/// Apply the error recurrence ε_{l+1} = A_l·ε_l + local_l and mark the
/// contract valid.
pub fn apply_error_recurrence(contract: &mut LayerContract, input_error_bound: f64) {
    contract.input_error_bound = input_error_bound;
    contract.output_error_bound =
        contract.amp_factor * input_error_bound + contract.local_error_sum;
    contract.is_valid = true;
}
