//! Fault flag discipline
//!
//! Seven named fault bits accumulate via bitwise OR as results move up the
//! pipeline and never reset automatically. Overflow and underflow are
//! recorded faults (the saturated result stays defined); every other bit is
//! fatal and blocks certificate generation.

use serde::{Deserialize, Serialize};

/// Wire codes for individual faults, as they appear in return codes and
/// serialized fault words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum FaultCode {
    /// Positive saturation occurred (recorded, non-fatal)
    Overflow = 0x01,
    /// Negative saturation occurred (recorded, non-fatal)
    Underflow = 0x02,
    /// Division by zero attempted
    DivZero = 0x04,
    /// Observed value escaped the claimed safe range
    RangeExceed = 0x08,
    /// BatchNorm left unfolded where folding is required
    UnfoldedBn = 0x10,
    /// Asymmetric quantization parameters encountered
    AsymmetricParams = 0x20,
    /// Measured error exceeded its theoretical bound
    BoundViolation = 0x40,
}

impl FaultCode {
    /// Overflow/underflow are recorded faults; everything else is fatal.
    pub fn is_fatal(self) -> bool {
        !matches!(self, FaultCode::Overflow | FaultCode::Underflow)
    }
}

const FATAL_MASK: u32 = FaultCode::DivZero as u32
    | FaultCode::RangeExceed as u32
    | FaultCode::UnfoldedBn as u32
    | FaultCode::AsymmetricParams as u32
    | FaultCode::BoundViolation as u32;

const ALL_MASK: u32 = FATAL_MASK | FaultCode::Overflow as u32 | FaultCode::Underflow as u32;

/// Accumulating fault bitset. Serializes to a single 32-bit word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaultSet(u32);

impl FaultSet {
    /// Empty fault set.
    pub fn new() -> Self {
        Self(0)
    }

    /// Reconstruct from a serialized word. Unknown bits are discarded.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits & ALL_MASK)
    }

    /// Raw 32-bit word for serialization.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Set a single fault bit.
    pub fn raise(&mut self, code: FaultCode) {
        self.0 |= code as u32;
    }

    /// True if the given fault bit is set.
    pub fn contains(self, code: FaultCode) -> bool {
        self.0 & code as u32 != 0
    }

    /// Bitwise-OR accumulate another fault set into this one.
    pub fn merge(&mut self, other: FaultSet) {
        self.0 |= other.0;
    }

    /// Any fault bit set.
    pub fn has_any(self) -> bool {
        self.0 != 0
    }

    /// Any bit except overflow/underflow set.
    pub fn has_fatal(self) -> bool {
        self.0 & FATAL_MASK != 0
    }

    pub fn overflow(self) -> bool {
        self.contains(FaultCode::Overflow)
    }

    pub fn underflow(self) -> bool {
        self.contains(FaultCode::Underflow)
    }

    pub fn div_zero(self) -> bool {
        self.contains(FaultCode::DivZero)
    }

    pub fn range_exceed(self) -> bool {
        self.contains(FaultCode::RangeExceed)
    }

    pub fn unfolded_bn(self) -> bool {
        self.contains(FaultCode::UnfoldedBn)
    }

    pub fn asymmetric(self) -> bool {
        self.contains(FaultCode::AsymmetricParams)
    }

    pub fn bound_violation(self) -> bool {
        self.contains(FaultCode::BoundViolation)
    }
}
