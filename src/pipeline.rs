//! Fail-closed certificate gating
//!
//! The outer driver runs Analyze → Calibrate → Convert → Verify in
//! sequence and hands their immutable outputs to [`certify`]. A
//! certificate is only sealed when every stage passed: an invalid or
//! incomplete analysis, a calibration range veto, a verification bound
//! violation, or any fatal fault anywhere blocks assembly and no artifact
//! is produced.

use crate::analyze::AnalysisContext;
use crate::calibrate::CalibrationReport;
use crate::certificate::{Certificate, CertificateBuilder, Clock, FORMAT_Q16_16};
use crate::convert::BnFoldingRecord;
use crate::error::{Error, Result};
use crate::fault::FaultSet;
use crate::hash::DIGEST_LEN;

/// Identity of the models the certificate binds together.
#[derive(Debug, Clone, Copy)]
pub struct TargetIdentity {
    /// SHA-256 of the quantized model image
    pub model_hash: [u8; DIGEST_LEN],
    pub param_count: u32,
    pub layer_count: u32,
}

/// Gate the stage outputs and seal a certificate.
///
/// `bn_record` is `None` when the source model carries no BatchNorm.
#[allow(clippy::too_many_arguments)]
pub fn certify(
    analysis: &AnalysisContext,
    calibration: &CalibrationReport,
    verification: &VerificationOutcome<'_>,
    source_model_hash: [u8; DIGEST_LEN],
    bn_record: Option<&BnFoldingRecord>,
    target: TargetIdentity,
    scope_format: u8,
    clock: &dyn Clock,
) -> Result<Certificate> {
    if !analysis.passed() {
        return Err(Error::NotBuildable("analysis incomplete or invalid"));
    }
    if !calibration.passed() {
        return Err(Error::NotBuildable("calibration range veto triggered"));
    }
    if !verification.report.passed() {
        return Err(Error::NotBuildable("verification bound violated"));
    }

    let mut merged = FaultSet::new();
    merged.merge(analysis.faults);
    merged.merge(calibration.faults);
    merged.merge(verification.report.faults);
    merged.merge(verification.conversion_faults);
    if merged.has_fatal() {
        return Err(Error::NotBuildable("fatal fault present in pipeline"));
    }

    let mut builder = CertificateBuilder::new()
        .with_format(scope_format)
        .with_source_hash(source_model_hash)
        .with_bn_info(
            bn_record.is_some_and(|r| r.folding_occurred),
            bn_record.map(|r| r.record_hash()),
        )
        .with_analysis(analysis.digest()?)
        .with_calibration(calibration.digest())
        .with_verification(verification.report.digest())
        .with_target(target.model_hash, target.param_count, target.layer_count);
    builder.merge_faults(merged);

    builder.build(clock)
}

/// Verification report plus the recorded (non-fatal) faults conversion
/// accumulated while producing the model under test.
#[derive(Debug, Clone)]
pub struct VerificationOutcome<'a> {
    pub report: &'a crate::verify::VerificationReport,
    pub conversion_faults: FaultSet,
}

impl<'a> VerificationOutcome<'a> {
    pub fn new(report: &'a crate::verify::VerificationReport) -> Self {
        Self {
            report,
            conversion_faults: FaultSet::new(),
        }
    }

    pub fn with_conversion_faults(mut self, faults: FaultSet) -> Self {
        self.conversion_faults = faults;
        self
    }
}

/// Convenience wrapper for the default Q16.16 scope.
pub fn certify_q16(
    analysis: &AnalysisContext,
    calibration: &CalibrationReport,
    verification: &VerificationOutcome<'_>,
    source_model_hash: [u8; DIGEST_LEN],
    bn_record: Option<&BnFoldingRecord>,
    target: TargetIdentity,
    clock: &dyn Clock,
) -> Result<Certificate> {
    certify(
        analysis,
        calibration,
        verification,
        source_model_hash,
        bn_record,
        target,
        FORMAT_Q16_16,
        clock,
    )
}
