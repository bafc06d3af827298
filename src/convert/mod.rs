//! Conversion (the Transformer)
//!
//! Turns FP32 parameters into symmetric fixed-point encodings: the RNE
//! quantization kernel, symmetric-only and dyadic-constraint enforcement,
//! and BatchNorm folding with a hashed before/after record. Asymmetric
//! parameters fail closed; only power-of-two scales are admitted.

mod bn_fold;
mod quantize;

pub use bn_fold::{fold_batchnorm, BnFoldingRecord, BnParams, FoldedLayer};
pub use quantize::{
    convert_weights, quantize_rne, verify_constraints, verify_symmetric, TensorSpec,
};
