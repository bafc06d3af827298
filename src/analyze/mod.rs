//! Static error analysis (the Theorist)
//!
//! Computes theoretical error bounds for quantization without executing
//! inference: interval arithmetic over the FP32 graph, operator-norm
//! amplification factors, and the closed-form recurrence
//! ε_{l+1} = A_l·ε_l + local_l. The resulting digest seeds calibration
//! (safe ranges), conversion (scale choices), and verification (bounds).
//!
//! All floating-point reductions here run in f64 with a fixed row-major,
//! left-to-right order; nothing in this module may use FMA or reassociation.

mod context;
mod contract;
mod norms;
mod range;

pub use context::{AnalysisContext, AnalysisDigest, AnalyzeConfig};
pub use contract::{
    apply_error_recurrence, compute_error_contributions, compute_overflow_proof, entry_error,
    LayerContract, LayerType, OverflowProof,
};
pub use norms::{frobenius_norm, row_sum_norm};
pub use range::{propagate_linear, propagate_relu, weight_range, Range};
