//! Certificate builder state machine
//!
//! EMPTY → partially filled (setters are idempotent) → COMPLETE →
//! `build()` seals. All six required inputs must be present; `build`
//! returns the specific missing input otherwise.

use super::{Certificate, Clock, FORMAT_Q16_16, CERTIFICATE_MAGIC, SCOPE_SYMMETRIC_ONLY};
use crate::analyze::AnalysisDigest;
use crate::calibrate::CalibrationDigest;
use crate::error::{Error, Result};
use crate::fault::FaultSet;
use crate::hash::{sha256, DIGEST_LEN};
use crate::verify::VerificationDigest;

/// Accumulates inputs for certificate assembly.
#[derive(Debug, Clone, Default)]
pub struct CertificateBuilder {
    source_model_hash: Option<[u8; DIGEST_LEN]>,
    bn_info: Option<(bool, [u8; DIGEST_LEN])>,
    analysis: Option<AnalysisDigest>,
    calibration: Option<CalibrationDigest>,
    verification: Option<VerificationDigest>,
    target: Option<([u8; DIGEST_LEN], u32, u32)>,

    scope_format: u8,
    tool_version: [u8; 4],

    faults: FaultSet,
}

impl CertificateBuilder {
    pub fn new() -> Self {
        Self {
            scope_format: FORMAT_Q16_16,
            tool_version: [0, 1, 0, 0],
            ..Default::default()
        }
    }

    pub fn with_version(mut self, major: u8, minor: u8, patch: u8, build: u8) -> Self {
        self.tool_version = [major, minor, patch, build];
        self
    }

    /// SHA-256 of the FP32 source model.
    pub fn with_source_hash(mut self, hash: [u8; DIGEST_LEN]) -> Self {
        self.source_model_hash = Some(hash);
        self
    }

    /// BatchNorm folding status and record hash (zeros when no BN present).
    pub fn with_bn_info(mut self, folded: bool, hash: Option<[u8; DIGEST_LEN]>) -> Self {
        self.bn_info = Some((folded, hash.unwrap_or([0u8; DIGEST_LEN])));
        self
    }

    pub fn with_analysis(mut self, digest: AnalysisDigest) -> Self {
        self.analysis = Some(digest);
        self
    }

    pub fn with_calibration(mut self, digest: CalibrationDigest) -> Self {
        self.calibration = Some(digest);
        self
    }

    pub fn with_verification(mut self, digest: VerificationDigest) -> Self {
        self.verification = Some(digest);
        self
    }

    /// SHA-256 of the quantized model plus its parameter and layer counts.
    pub fn with_target(
        mut self,
        hash: [u8; DIGEST_LEN],
        param_count: u32,
        layer_count: u32,
    ) -> Self {
        self.target = Some((hash, param_count, layer_count));
        self
    }

    /// Scope format code (`FORMAT_Q16_16` or `FORMAT_Q8_24`).
    pub fn with_format(mut self, format: u8) -> Self {
        self.scope_format = format;
        self
    }

    /// Merge upstream faults into the builder's record.
    pub fn merge_faults(&mut self, faults: FaultSet) {
        self.faults.merge(faults);
    }

    pub fn faults(&self) -> FaultSet {
        self.faults
    }

    /// All six required inputs present.
    pub fn is_complete(&self) -> bool {
        self.missing_input().is_none()
    }

    fn missing_input(&self) -> Option<&'static str> {
        if self.source_model_hash.is_none() {
            return Some("source model hash");
        }
        if self.bn_info.is_none() {
            return Some("BatchNorm folding info");
        }
        if self.analysis.is_none() {
            return Some("analysis digest");
        }
        if self.calibration.is_none() {
            return Some("calibration digest");
        }
        if self.verification.is_none() {
            return Some("verification digest");
        }
        if self.target.is_none() {
            return Some("target identity");
        }
        None
    }

    /// Assemble and seal the certificate.
    ///
    /// Each stage digest is hashed through its canonical byte layout into
    /// the mathematical-core section; the claims are copied from the
    /// analysis and verification digests; the Merkle root is computed last
    /// and the signature slot is zero-filled (unsigned).
    pub fn build(&self, clock: &dyn Clock) -> Result<Certificate> {
        if let Some(missing) = self.missing_input() {
            return Err(Error::IncompleteBuilder(missing));
        }

        let (bn_folded, bn_hash) = self.bn_info.expect("checked by missing_input");
        let analysis = self.analysis.expect("checked by missing_input");
        let calibration = self.calibration.expect("checked by missing_input");
        let verification = self.verification.expect("checked by missing_input");
        let (target_hash, param_count, layer_count) = self.target.expect("checked by missing_input");

        let mut cert = Certificate {
            magic: CERTIFICATE_MAGIC,
            version: self.tool_version,
            timestamp: clock.unix_seconds(),
            scope_symmetric_only: SCOPE_SYMMETRIC_ONLY,
            scope_format: self.scope_format,
            source_model_hash: self.source_model_hash.expect("checked by missing_input"),
            bn_folding_hash: bn_hash,
            bn_folding_status: if bn_folded { 0x01 } else { 0x00 },
            analysis_digest: sha256(&analysis.to_bytes()),
            calibration_digest: sha256(&calibration.to_bytes()),
            verification_digest: sha256(&verification.to_bytes()),
            epsilon_0_claimed: analysis.entry_error,
            epsilon_total_claimed: analysis.total_error_bound,
            epsilon_max_measured: verification.total_error_max_measured,
            target_model_hash: target_hash,
            target_param_count: param_count,
            target_layer_count: layer_count,
            merkle_root: [0u8; DIGEST_LEN],
            signature: [0u8; 64],
        };

        cert.merkle_root = cert.compute_merkle();
        Ok(cert)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{
        synthetic_analysis_digest, synthetic_calibration_digest, synthetic_verification_digest,
    };
    use super::super::FixedClock;
    use super::*;
    use crate::fault::FaultCode;

    fn complete_builder() -> CertificateBuilder {
        CertificateBuilder::new()
            .with_source_hash([0x01; 32])
            .with_bn_info(false, None)
            .with_analysis(synthetic_analysis_digest())
            .with_calibration(synthetic_calibration_digest())
            .with_verification(synthetic_verification_digest())
            .with_target([0x03; 32], 100_000, 5)
    }

    #[test]
    fn test_new_builder_is_incomplete() {
        let b = CertificateBuilder::new();
        assert!(!b.is_complete());
        let err = b.build(&FixedClock(0));
        assert!(matches!(err, Err(Error::IncompleteBuilder("source model hash"))));
    }

    #[test]
    fn test_each_missing_input_named() {
        let b = CertificateBuilder::new().with_source_hash([0u8; 32]);
        assert!(matches!(
            b.build(&FixedClock(0)),
            Err(Error::IncompleteBuilder("BatchNorm folding info"))
        ));

        let b = b.with_bn_info(false, None);
        assert!(matches!(
            b.build(&FixedClock(0)),
            Err(Error::IncompleteBuilder("analysis digest"))
        ));
    }

    #[test]
    fn test_complete_builder_builds() {
        let b = complete_builder();
        assert!(b.is_complete());
        let cert = b.build(&FixedClock(42)).unwrap();
        assert_eq!(cert.timestamp, 42);
        assert_eq!(cert.magic, *b"CQCR");
        assert!(cert.verify_integrity());
    }

    #[test]
    fn test_setters_are_idempotent() {
        let b = complete_builder()
            .with_source_hash([0x01; 32])
            .with_source_hash([0x01; 32]);
        assert!(b.is_complete());
        let cert = b.build(&FixedClock(0)).unwrap();
        assert_eq!(cert.source_model_hash, [0x01; 32]);
    }

    #[test]
    fn test_last_setter_wins() {
        let cert = complete_builder()
            .with_target([0x04; 32], 1, 1)
            .build(&FixedClock(0))
            .unwrap();
        assert_eq!(cert.target_model_hash, [0x04; 32]);
        assert_eq!(cert.target_param_count, 1);
    }

    #[test]
    fn test_claims_copied_from_digests() {
        let cert = complete_builder().build(&FixedClock(0)).unwrap();
        assert_eq!(cert.epsilon_0_claimed, 7.63e-6);
        assert_eq!(cert.epsilon_total_claimed, 1.0e-4);
        assert_eq!(cert.epsilon_max_measured, 8.5e-5);
        assert!(cert.bounds_satisfied());
    }

    #[test]
    fn test_digest_slots_are_hashes_of_canonical_bytes() {
        let analysis = synthetic_analysis_digest();
        let cert = complete_builder().build(&FixedClock(0)).unwrap();
        assert_eq!(cert.analysis_digest, sha256(&analysis.to_bytes()));
        assert_eq!(
            cert.calibration_digest,
            sha256(&synthetic_calibration_digest().to_bytes())
        );
        assert_eq!(
            cert.verification_digest,
            sha256(&synthetic_verification_digest().to_bytes())
        );
    }

    #[test]
    fn test_unsigned_signature_is_zero_filled() {
        let cert = complete_builder().build(&FixedClock(0)).unwrap();
        assert_eq!(cert.signature, [0u8; 64]);
    }

    #[test]
    fn test_bn_info_without_hash_zeroes_slot() {
        let cert = complete_builder().build(&FixedClock(0)).unwrap();
        assert_eq!(cert.bn_folding_hash, [0u8; 32]);
        assert_eq!(cert.bn_folding_status, 0x00);
    }

    #[test]
    fn test_builder_fault_accumulation() {
        let mut b = complete_builder();
        let mut f = FaultSet::new();
        f.raise(FaultCode::Overflow);
        b.merge_faults(f);

        let mut g = FaultSet::new();
        g.raise(FaultCode::Underflow);
        b.merge_faults(g);

        assert!(b.faults().overflow());
        assert!(b.faults().underflow());
        assert!(!b.faults().has_fatal());
    }

    #[test]
    fn test_two_builds_same_inputs_identical() {
        let b = complete_builder();
        let c1 = b.build(&FixedClock(7)).unwrap();
        let c2 = b.build(&FixedClock(7)).unwrap();
        assert_eq!(c1, c2);
        assert_eq!(c1.to_bytes(), c2.to_bytes());
    }
}
