//! Error types for Certificar

use crate::fault::FaultCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Buffer too small: expected {expected} bytes, got {got}")]
    BufferTooSmall { expected: usize, got: usize },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Dyadic constraint violated: expected bias exponent {expected}, got {got}")]
    DyadicViolation { expected: i16, got: i16 },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Certificate builder incomplete: missing {0}")]
    IncompleteBuilder(&'static str),

    #[error("Fail-closed fault raised: {0:?}")]
    FaultRaised(FaultCode),

    #[error("Certificate not buildable: {0}")]
    NotBuildable(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
