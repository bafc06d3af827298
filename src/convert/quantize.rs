//! RNE quantization kernel and constraint enforcement

use crate::dvm::{scale_from_exp, Fixed16, FixedFormat, ScaleExp};
use crate::error::{Error, Result};
use crate::fault::{FaultCode, FaultSet};
use crate::model::LayerHeader;
use serde::{Deserialize, Serialize};

/// Quantization spec for one tensor: its power-of-two scale, storage
/// format, and symmetry declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TensorSpec {
    /// n such that S = 2^n
    pub scale_exp: ScaleExp,
    pub format: FixedFormat,
    pub is_symmetric: bool,
}

impl TensorSpec {
    pub fn symmetric(scale_exp: ScaleExp, format: FixedFormat) -> Self {
        Self {
            scale_exp,
            format,
            is_symmetric: true,
        }
    }

    /// Scale factor S = 2^n.
    pub fn scale(&self) -> f64 {
        scale_from_exp(self.scale_exp)
    }
}

/// Quantize a single FP32 value to fixed point with round-to-nearest-even.
///
/// The product is formed in f64. `f64::round` is ties-away-from-zero, so
/// exact halves (detected by `r − scaled = ±0.5`) are pulled back toward
/// the even integer. Saturation to i32 records overflow/underflow.
pub fn quantize_rne(w: f32, scale: f64, faults: &mut FaultSet) -> Fixed16 {
    let scaled = w as f64 * scale;

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

/// Enforce the symmetric-only scope. Asymmetric specs fail closed.
pub fn verify_symmetric(spec: &TensorSpec, faults: &mut FaultSet) -> Result<()> {
    if !spec.is_symmetric {
        faults.raise(FaultCode::AsymmetricParams);
        return Err(Error::FaultRaised(FaultCode::AsymmetricParams));
    }
    Ok(())
}

/// Enforce all conversion constraints on a layer header: every tensor spec
/// symmetric, and the dyadic constraint
/// `bias.scale_exp == weight.scale_exp + input.scale_exp`.
///
/// On a dyadic mismatch `dyadic_valid` is cleared and the violation is
/// returned; the caller must not emit the layer.
pub fn verify_constraints(hdr: &mut LayerHeader, faults: &mut FaultSet) -> Result<()> {
    verify_symmetric(&hdr.weight_spec, faults)?;
    verify_symmetric(&hdr.input_spec, faults)?;
    verify_symmetric(&hdr.bias_spec, faults)?;

    let expected = hdr.weight_spec.scale_exp as i16 + hdr.input_spec.scale_exp as i16;
    let got = hdr.bias_spec.scale_exp as i16;

    if got != expected {
        hdr.dyadic_valid = false;
        return Err(Error::DyadicViolation { expected, got });
    }

    hdr.dyadic_valid = true;
    Ok(())
}

/// Batch-quantize a weight array under one tensor spec.
pub fn convert_weights(
    weights: &[f32],
    spec: &TensorSpec,
    faults: &mut FaultSet,
) -> Result<Vec<Fixed16>> {
    verify_symmetric(spec, faults)?;

    let scale = spec.scale();
    Ok(weights
        .iter()
        .map(|&w| quantize_rne(w, scale, faults))
        .collect())
}
