//! Verification (the Judge)
//!
//! Measures the quantized model's actual deviation from the FP32 reference
//! under the L∞ norm, aggregates per-layer and end-to-end statistics, and
//! checks every measurement against the theoretical bounds from analysis.
//! Exact equality satisfies a bound; any violation raises `bound_violation`
//! and blocks the certificate.

mod measure;
mod report;

pub use measure::{linf_norm, linf_norm_q16};
pub use report::{LayerComparison, VerificationDigest, VerificationReport, VerifyConfig};
