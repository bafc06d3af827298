//! Certificate assembly and verification (the Notary)
//!
//! The certificate is a 360-byte fixed-layout record with seven contiguous
//! sections: metadata, scope, source identity, mathematical core (the three
//! stage-digest hashes), claims, target identity, and integrity. It is
//! sealed by a Merkle root — SHA-256 over bytes 0..264, everything before
//! the integrity section — so any single-byte change to the attested
//! content is detectable, while the signature slot stays outside the hash
//! input.

mod builder;

pub use builder::CertificateBuilder;

use crate::error::{Error, Result};
use crate::hash::{sha256, to_hex, DIGEST_LEN};
use chrono::Utc;
use std::fmt;
use std::path::Path;

/// Serialized certificate size in bytes.
pub const CERTIFICATE_SIZE: usize = 360;
/// Byte length of the Merkle-root hash input (sections 1-6).
pub const MERKLE_CONTENT_LEN: usize = 264;
/// ASCII magic at offset 0.
pub const CERTIFICATE_MAGIC: [u8; 4] = *b"CQCR";
/// Scope byte: symmetric quantization only.
pub const SCOPE_SYMMETRIC_ONLY: u8 = 0x01;
/// Scope format code for Q16.16.
pub const FORMAT_Q16_16: u8 = 0x00;
/// Scope format code for Q8.24.
pub const FORMAT_Q8_24: u8 = 0x01;

/// Injected wall-clock capability so certificate timestamps are testable.
pub trait Clock {
    /// Current time as Unix seconds UTC.
    fn unix_seconds(&self) -> u64;
}

/// Production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_seconds(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}

/// Deterministic clock for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn unix_seconds(&self) -> u64 {
        self.0
    }
}

/// The sealed proof object. Produced once by [`CertificateBuilder::build`]
/// and read-only thereafter; any mutation invalidates the Merkle root and
/// is detectable via [`Certificate::verify_integrity`].
#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    // 1. Metadata (16 bytes)
    pub magic: [u8; 4],
    pub version: [u8; 4],
    /// Unix timestamp, UTC seconds
    pub timestamp: u64,

    // 2. Scope (8 bytes)
    pub scope_symmetric_only: u8,
    pub scope_format: u8,

    // 3. Source identity (72 bytes)
    pub source_model_hash: [u8; DIGEST_LEN],
    pub bn_folding_hash: [u8; DIGEST_LEN],
    /// 0x00 = no BN, 0x01 = folded
    pub bn_folding_status: u8,

    // 4. Mathematical core (96 bytes)
    pub analysis_digest: [u8; DIGEST_LEN],
    pub calibration_digest: [u8; DIGEST_LEN],
    pub verification_digest: [u8; DIGEST_LEN],

    // 5. Claims (32 bytes)
    pub epsilon_0_claimed: f64,
    pub epsilon_total_claimed: f64,
    pub epsilon_max_measured: f64,

    // 6. Target identity (40 bytes)
    pub target_model_hash: [u8; DIGEST_LEN],
    pub target_param_count: u32,
    pub target_layer_count: u32,

    // 7. Integrity (96 bytes)
    pub merkle_root: [u8; DIGEST_LEN],
    /// Ed25519 signature slot; zeros when unsigned
    pub signature: [u8; 64],
}

impl Certificate {
    /// Serialize to the fixed 360-byte little-endian layout.
    pub fn to_bytes(&self) -> [u8; CERTIFICATE_SIZE] {
        let mut out = [0u8; CERTIFICATE_SIZE];
        out[0..4].copy_from_slice(&self.magic);
        out[4..8].copy_from_slice(&self.version);
        out[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        out[16] = self.scope_symmetric_only;
        out[17] = self.scope_format;
        // 18..24 reserved
        out[24..56].copy_from_slice(&self.source_model_hash);
        out[56..88].copy_from_slice(&self.bn_folding_hash);
        out[88] = self.bn_folding_status;
        // 89..96 reserved
        out[96..128].copy_from_slice(&self.analysis_digest);
        out[128..160].copy_from_slice(&self.calibration_digest);
        out[160..192].copy_from_slice(&self.verification_digest);
        out[192..200].copy_from_slice(&self.epsilon_0_claimed.to_le_bytes());
        out[200..208].copy_from_slice(&self.epsilon_total_claimed.to_le_bytes());
        out[208..216].copy_from_slice(&self.epsilon_max_measured.to_le_bytes());
        // 216..224 reserved claims slot
        out[224..256].copy_from_slice(&self.target_model_hash);
        out[256..260].copy_from_slice(&self.target_param_count.to_le_bytes());
        out[260..264].copy_from_slice(&self.target_layer_count.to_le_bytes());
        out[264..296].copy_from_slice(&self.merkle_root);
        out[296..360].copy_from_slice(&self.signature);
        out
    }

    /// Deserialize from a byte buffer.
    ///
    /// Rejects buffers shorter than 360 bytes, wrong magic, a scope byte
    /// other than symmetric-only, and unknown format codes. Integrity is
    /// NOT checked here; call [`Certificate::verify_integrity`] after.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < CERTIFICATE_SIZE {
            return Err(Error::BufferTooSmall {
                expected: CERTIFICATE_SIZE,
                got: buf.len(),
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        if magic != CERTIFICATE_MAGIC {
            return Err(Error::InvalidFormat("certificate magic mismatch".into()));
        }

        let scope_symmetric_only = buf[16];
        if scope_symmetric_only != SCOPE_SYMMETRIC_ONLY {
            return Err(Error::InvalidFormat("unsupported certificate scope".into()));
        }

        let scope_format = buf[17];
        if scope_format != FORMAT_Q16_16 && scope_format != FORMAT_Q8_24 {
            return Err(Error::InvalidFormat(format!(
                "unknown scope format 0x{scope_format:02x}"
            )));
        }

        // Reserved regions are attested by the Merkle root but re-zeroed on
        // serialization, so a tamper there must be caught at parse time.
        let reserved_zero = buf[18..24].iter().all(|&b| b == 0)
            && buf[89..96].iter().all(|&b| b == 0)
            && buf[216..224].iter().all(|&b| b == 0);
        if !reserved_zero {
            return Err(Error::InvalidFormat("reserved bytes must be zero".into()));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&buf[4..8]);

        let read32 = |range: std::ops::Range<usize>| -> [u8; DIGEST_LEN] {
            let mut h = [0u8; DIGEST_LEN];
            h.copy_from_slice(&buf[range]);
            h
        };
        let read_f64 = |start: usize| -> f64 {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[start..start + 8]);
            f64::from_le_bytes(b)
        };
        let read_u32 = |start: usize| -> u32 {
            let mut b = [0u8; 4];
            b.copy_from_slice(&buf[start..start + 4]);
            u32::from_le_bytes(b)
        };

        let mut timestamp_bytes = [0u8; 8];
        timestamp_bytes.copy_from_slice(&buf[8..16]);

        let mut signature = [0u8; 64];
        signature.copy_from_slice(&buf[296..360]);

        Ok(Self {
            magic,
            version,
            timestamp: u64::from_le_bytes(timestamp_bytes),
            scope_symmetric_only,
            scope_format,
            source_model_hash: read32(24..56),
            bn_folding_hash: read32(56..88),
            bn_folding_status: buf[88],
            analysis_digest: read32(96..128),
            calibration_digest: read32(128..160),
            verification_digest: read32(160..192),
            epsilon_0_claimed: read_f64(192),
            epsilon_total_claimed: read_f64(200),
            epsilon_max_measured: read_f64(208),
            target_model_hash: read32(224..256),
            target_param_count: read_u32(256),
            target_layer_count: read_u32(260),
            merkle_root: read32(264..296),
            signature,
        })
    }

    /// Recompute the Merkle root over the attested content (bytes 0..264).
    pub fn compute_merkle(&self) -> [u8; DIGEST_LEN] {
        let bytes = self.to_bytes();
        sha256(&bytes[..MERKLE_CONTENT_LEN])
    }

    /// True when the stored Merkle root matches the recomputed one.
    pub fn verify_integrity(&self) -> bool {
        self.compute_merkle() == self.merkle_root
    }

    /// True when the certificate's claims are internally consistent:
    /// ε_max_measured ≤ ε_total_claimed. A sealed certificate failing this
    /// is invalid regardless of integrity.
    pub fn bounds_satisfied(&self) -> bool {
        self.epsilon_max_measured <= self.epsilon_total_claimed
    }

    /// Header sanity: magic, scope, and format are recognized.
    pub fn verify_header(&self) -> bool {
        self.magic == CERTIFICATE_MAGIC
            && self.scope_symmetric_only == SCOPE_SYMMETRIC_ONLY
            && (self.scope_format == FORMAT_Q16_16 || self.scope_format == FORMAT_Q8_24)
    }

    /// Write the serialized certificate to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }

    /// Read and validate a certificate from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Quantization Certificate ===")?;
        writeln!(
            f,
            "Version: {}.{}.{}.{}",
            self.version[0], self.version[1], self.version[2], self.version[3]
        )?;
        writeln!(f, "Timestamp: {}", self.timestamp)?;
        writeln!(
            f,
            "Format: {}",
            if self.scope_format == FORMAT_Q16_16 {
                "Q16.16"
            } else {
                "Q8.24"
            }
        )?;
        writeln!(
            f,
            "BN Folded: {}",
            if self.bn_folding_status == 0x01 { "yes" } else { "no" }
        )?;
        writeln!(f, "Entry error (eps_0): {:.6e}", self.epsilon_0_claimed)?;
        writeln!(f, "Total bound (eps_total): {:.6e}", self.epsilon_total_claimed)?;
        writeln!(f, "Measured max (eps_max): {:.6e}", self.epsilon_max_measured)?;
        writeln!(
            f,
            "Bounds satisfied: {}",
            if self.bounds_satisfied() { "YES" } else { "NO" }
        )?;
        writeln!(f, "Layers: {}", self.target_layer_count)?;
        writeln!(f, "Parameters: {}", self.target_param_count)?;
        writeln!(f, "Merkle root: {}", to_hex(&self.merkle_root))?;
        write!(
            f,
            "Integrity: {}",
            if self.verify_integrity() { "VALID" } else { "INVALID" }
        )
    }
}
