//! Deterministic fixed-point primitives (DVM)
//!
//! The arithmetic core every other stage builds on: saturating 32/64-bit
//! operations with fault reporting, round-to-nearest-even shifts, Q16.16
//! multiply/divide, the 64-bit MAC path, and overflow-safety proofs.
//! Every operation is exact under integer arithmetic and byte-identical
//! across platforms.

mod fixed;
mod primitives;

pub use fixed::{
    acc_to_q16, div_q16, mac_q16, mul_q16, q16_from_f64, q16_to_f64, Accum64, Fixed16, Fixed24,
    FixedFormat, ScaleExp, Q16_EPS, Q16_HALF, Q16_ONE, Q16_SHIFT, Q24_ONE, Q24_SHIFT,
};
pub use primitives::{add64_sat, clamp32, round_shift_rne, sra32, sra64, sub64_sat};

/// Scale factor S = 2^exp as f64.
pub fn scale_from_exp(exp: ScaleExp) -> f64 {
    f64::powi(2.0, exp as i32)
}
