//! Fixed-point storage types and Q16.16 arithmetic

use super::primitives::{add64_sat, clamp32, round_shift_rne};
use crate::fault::{FaultCode, FaultSet};
use serde::{Deserialize, Serialize};

/// Q16.16 fixed-point: 16 integer bits, 16 fractional bits.
pub type Fixed16 = i32;

/// Q8.24 fixed-point: 8 integer bits, 24 fractional bits.
pub type Fixed24 = i32;

/// Q32.32 accumulator for dot products.
pub type Accum64 = i64;

/// Scale exponent n such that S = 2^n. Only power-of-two scales are
/// admitted anywhere in the pipeline.
pub type ScaleExp = i8;

pub const Q16_SHIFT: u32 = 16;
pub const Q16_ONE: Fixed16 = 0x0001_0000;
pub const Q16_HALF: Fixed16 = 0x0000_8000;
pub const Q16_EPS: Fixed16 = 1;

pub const Q24_SHIFT: u32 = 24;
pub const Q24_ONE: Fixed24 = 1 << Q24_SHIFT;

/// Fixed-point format selector. Wire values appear in layer headers, the
/// model file, and the certificate scope byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum FixedFormat {
    #[default]
    Q16_16 = 0,
    Q8_24 = 1,
    Q32_32 = 2,
}

impl FixedFormat {
    /// Number of fractional bits in this format.
    pub fn frac_bits(self) -> u32 {
        match self {
            FixedFormat::Q16_16 => 16,
            FixedFormat::Q8_24 => 24,
            FixedFormat::Q32_32 => 32,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FixedFormat::Q16_16),
            1 => Some(FixedFormat::Q8_24),
            2 => Some(FixedFormat::Q32_32),
            _ => None,
        }
    }
}

/// Q16.16 multiply: widen to i64, RNE-shift by 16, saturate.
pub fn mul_q16(a: Fixed16, b: Fixed16, faults: &mut FaultSet) -> Fixed16 {
    let wide = a as i64 * b as i64;
    round_shift_rne(wide, Q16_SHIFT, faults)
}

/// Q16.16 divide with RNE on the remainder. `b == 0` raises `div_zero` and
/// returns 0.
pub fn div_q16(a: Fixed16, b: Fixed16, faults: &mut FaultSet) -> Fixed16 {
    if b == 0 {
        faults.raise(FaultCode::DivZero);
        return 0;
    }

    let wide_a = (a as i64) << Q16_SHIFT;
    let b64 = b as i64;
    let mut quot = wide_a / b64;
    let rem = wide_a % b64;

    let half_b = b64.abs() / 2;
    let abs_rem = rem.abs();

    if abs_rem > half_b {
        quot += if quot >= 0 { 1 } else { -1 };
    } else if abs_rem == half_b && quot & 1 != 0 {
        quot += if quot >= 0 { 1 } else { -1 };
    }

    clamp32(quot, faults)
}

/// Multiply-accumulate into a Q32.32 accumulator with saturation.
pub fn mac_q16(acc: &mut Accum64, a: Fixed16, b: Fixed16, faults: &mut FaultSet) {
    let product = a as i64 * b as i64;
    *acc = add64_sat(*acc, product, faults);
}

/// Convert a Q32.32 accumulator back to Q16.16.
pub fn acc_to_q16(acc: Accum64, faults: &mut FaultSet) -> Fixed16 {
    round_shift_rne(acc, Q16_SHIFT, faults)
}

/// Decode Q16.16 to f64. Exact for every representable value.
pub fn q16_to_f64(v: Fixed16) -> f64 {
    v as f64 / (1u32 << Q16_SHIFT) as f64
}

/// Encode f64 to Q16.16 with round-half-to-even, saturating.
pub fn q16_from_f64(v: f64, faults: &mut FaultSet) -> Fixed16 {
    let scaled = v * (1u32 << Q16_SHIFT) as f64;
    // f64 round() is ties-away-from-zero; pull exact halves back to even.
    let mut r = scaled.round();
    if (r - scaled).abs() == 0.5 && (r as i64) % 2 != 0 {
        r += if scaled > 0.0 { -1.0 } else { 1.0 };
    }
    if r > i32::MAX as f64 {
        faults.raise(FaultCode::Overflow);
        return i32::MAX;
    }
    if r < i32::MIN as f64 {
        faults.raise(FaultCode::Underflow);
        return i32::MIN;
    }
    r as Fixed16
}
