//! BatchNorm folding
//!
//! Folds per-channel BatchNorm parameters into the preceding linear layer:
//!
//! ```text
//! W'[i,j] = W[i,j] · γᵢ / √(σᵢ² + ε)
//! b'[i]   = b[i] · scaleᵢ + (βᵢ − μᵢ · scaleᵢ)
//! ```
//!
//! Intermediates are f64, storage is f32. The folding record carries a
//! SHA-256 over the original BN parameters and another over the folded
//! weights, so the certificate can attest exactly what was folded.

use crate::error::{Error, Result};
use crate::fault::{FaultCode, FaultSet};
use crate::hash::{Sha256Stream, DIGEST_LEN};
use serde::{Deserialize, Serialize};

/// Per-channel BatchNorm parameters.
#[derive(Debug, Clone)]
pub struct BnParams<'a> {
    pub gamma: &'a [f32],
    pub beta: &'a [f32],
    pub mean: &'a [f32],
    pub var: &'a [f32],
    pub epsilon: f32,
}

impl BnParams<'_> {
    pub fn channel_count(&self) -> usize {
        self.gamma.len()
    }
}

/// Attestation record for one folding operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BnFoldingRecord {
    /// SHA-256 over (γ ‖ β ‖ μ ‖ σ² ‖ ε) before folding
    pub original_bn_hash: [u8; DIGEST_LEN],
    /// SHA-256 over (W' ‖ b') after folding
    pub folded_weights_hash: [u8; DIGEST_LEN],
    pub layer_index: u32,
    pub folding_occurred: bool,
}

impl BnFoldingRecord {
    /// SHA-256 over the record's fixed little-endian layout; this is the
    /// value bound into the certificate's source-identity section.
    pub fn record_hash(&self) -> [u8; DIGEST_LEN] {
        let mut stream = Sha256Stream::new();
        stream.update(&self.original_bn_hash);
        stream.update(&self.folded_weights_hash);
        stream.update(&self.layer_index.to_le_bytes());
        stream.update(&[self.folding_occurred as u8]);
        stream.finalize()
    }
}

/// Result of folding: new weights, new bias, and the attestation record.
#[derive(Debug, Clone)]
pub struct FoldedLayer {
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
    pub record: BnFoldingRecord,
}

fn hash_f32_slice(stream: &mut Sha256Stream, values: &[f32]) {
    for v in values {
        stream.update(&v.to_le_bytes());
    }
}

/// Fold BatchNorm into a `rows × cols` weight matrix with optional bias.
///
/// `σ² + ε ≤ 0` for any channel raises `div_zero` and fails closed. The BN
/// channel count must equal the weight row count.
pub fn fold_batchnorm(
    weights: &[f32],
    bias: Option<&[f32]>,
    bn: &BnParams<'_>,
    rows: usize,
    cols: usize,
    layer_index: u32,
    faults: &mut FaultSet,
) -> Result<FoldedLayer> {
    if weights.len() != rows * cols {
        return Err(Error::DimensionMismatch {
            expected: rows * cols,
            got: weights.len(),
        });
    }
    if bn.channel_count() != rows
        || bn.beta.len() != rows
        || bn.mean.len() != rows
        || bn.var.len() != rows
    {
        return Err(Error::DimensionMismatch {
            expected: rows,
            got: bn.channel_count(),
        });
    }
    if let Some(b) = bias {
        if b.len() != rows {
            return Err(Error::DimensionMismatch {
                expected: rows,
                got: b.len(),
            });
        }
    }

    let mut original = Sha256Stream::new();
    hash_f32_slice(&mut original, bn.gamma);
    hash_f32_slice(&mut original, bn.beta);
    hash_f32_slice(&mut original, bn.mean);
    hash_f32_slice(&mut original, bn.var);
    original.update(&bn.epsilon.to_le_bytes());
    let original_bn_hash = original.finalize();

    let mut folded_weights = vec![0.0f32; rows * cols];
    let mut folded_bias = vec![0.0f32; rows];

    for i in 0..rows {
        let var_eps = bn.var[i] as f64 + bn.epsilon as f64;
        if var_eps <= 0.0 {
            faults.raise(FaultCode::DivZero);
            return Err(Error::FaultRaised(FaultCode::DivZero));
        }

        let inv_std = 1.0 / var_eps.sqrt();
        let scale = bn.gamma[i] as f64 * inv_std;
        let offset = bn.beta[i] as f64 - bn.mean[i] as f64 * scale;

        let old_b = bias.map_or(0.0, |b| b[i] as f64);
        folded_bias[i] = (old_b * scale + offset) as f32;

        for j in 0..cols {
            let idx = i * cols + j;
            folded_weights[idx] = (weights[idx] as f64 * scale) as f32;
        }
    }

    let mut folded = Sha256Stream::new();
    hash_f32_slice(&mut folded, &folded_weights);
    hash_f32_slice(&mut folded, &folded_bias);
    let folded_weights_hash = folded.finalize();

    Ok(FoldedLayer {
        weights: folded_weights,
        bias: folded_bias,
        record: BnFoldingRecord {
            original_bn_hash,
            folded_weights_hash,
            layer_index,
            folding_occurred: true,
        },
    })
}
