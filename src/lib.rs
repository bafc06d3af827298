//! # Certificar: Certified Fixed-Point Quantization
//!
//! Certificar transforms a trained floating-point network into a
//! deterministic fixed-point model and emits a tamper-evident certificate
//! binding the transformation to provable numerical-error bounds. The
//! certificate states, for a specific source model and calibration/
//! verification dataset pair, that the quantized model's output deviates
//! from the reference by no more than a named bound ε_total under the L∞
//! norm.
//!
//! ## Architecture
//!
//! The pipeline is a directed acyclic data-flow:
//! **Analyze → Calibrate → Convert → Verify → Certify**. Each stage produces
//! an immutable digest consumed by the certificate; analysis additionally
//! seeds calibration (safe ranges), conversion (scale choices), and
//! verification (theoretical bounds).
//!
//! - **dvm**: Deterministic fixed-point primitives (rounding, saturation,
//!   MAC, overflow proofs)
//! - **hash**: SHA-256 backend for every digest in the hash chain
//! - **analyze**: Static error bounds via interval arithmetic, operator
//!   norms, and the closed-form error recurrence
//! - **calibrate**: Per-tensor range observation, coverage metrics,
//!   fail-closed range veto
//! - **convert**: Symmetric quantization, dyadic constraint, BatchNorm
//!   folding
//! - **verify**: L∞ measurement against theoretical bounds
//! - **certificate**: 360-byte certificate with Merkle-root integrity
//! - **model**: Quantized model binary image (CQ16/CQ24)
//! - **pipeline**: Fail-closed gating from stage outputs to a sealed
//!   certificate
//!
//! All reductions run in a fixed, documented order (array index ascending,
//! row-major for matrices); this is the sole mechanism establishing
//! byte-identical outputs across platforms. The pipeline is single-threaded
//! by contract and stages communicate only through immutable values.

pub mod analyze;
pub mod calibrate;
pub mod certificate;
pub mod convert;
pub mod dvm;
pub mod error;
pub mod fault;
pub mod hash;
pub mod model;
pub mod pipeline;
pub mod verify;

pub use error::{Error, Result};
pub use fault::{FaultCode, FaultSet};
