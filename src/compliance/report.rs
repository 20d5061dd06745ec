//! Compliance report derivation
//!
//! Reports are built fresh on every request from the record, its audit
//! trail and a live signature check. Nothing here touches storage.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audit::AuditEntry;
use crate::ledger::types::DiagnosticRecord;

pub const CERTIFIED: &str = "Class II Medical Device Software";
pub const PENDING_REVIEW: &str = "Pending Review";
pub const NOT_CERTIFIED: &str = "Not Certified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    NeedsReview,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "COMPLIANT",
            ComplianceStatus::NonCompliant => "NON_COMPLIANT",
            ComplianceStatus::NeedsReview => "NEEDS_REVIEW",
        }
    }

    /// Status for one regime: an unverifiable record always needs review,
    /// otherwise the creation-time flag decides.
    pub fn derive(flag: bool, signature_verified: bool) -> Self {
        match (signature_verified, flag) {
            (false, _) => ComplianceStatus::NeedsReview,
            (true, true) => ComplianceStatus::Compliant,
            (true, false) => ComplianceStatus::NonCompliant,
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub diagnosis_id: u64,
    pub fda_status: ComplianceStatus,
    pub hipaa_status: ComplianceStatus,
    pub audit_trail_complete: bool,
    pub signature_verified: bool,
    pub regulatory_notes: Vec<String>,
    pub certification_level: String,
    pub generated_timestamp: u64,
}

impl ComplianceReport {
    /// Flags this report raises on the audit entry recording its generation.
    pub fn raised_flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.fda_status == ComplianceStatus::NonCompliant {
            flags.push("FDA_NON_COMPLIANT");
        }
        if self.hipaa_status == ComplianceStatus::NonCompliant {
            flags.push("HIPAA_NON_COMPLIANT");
        }
        if !self.signature_verified {
            flags.push("SIGNATURE_INVALID");
        }
        if self.fda_status == ComplianceStatus::NeedsReview
            || self.hipaa_status == ComplianceStatus::NeedsReview
        {
            flags.push("NEEDS_REVIEW");
        }
        if !self.audit_trail_complete {
            flags.push("AUDIT_TRAIL_INCOMPLETE");
        }
        flags
    }
}

pub fn certification_level(
    fda_status: ComplianceStatus,
    hipaa_status: ComplianceStatus,
    signature_verified: bool,
) -> &'static str {
    use ComplianceStatus::*;
    match (fda_status, hipaa_status, signature_verified) {
        (Compliant, Compliant, true) => CERTIFIED,
        (NeedsReview, _, _) | (_, NeedsReview, _) => PENDING_REVIEW,
        _ => NOT_CERTIFIED,
    }
}

pub fn regulatory_notes(
    fda_status: ComplianceStatus,
    hipaa_status: ComplianceStatus,
    signature_verified: bool,
    audit_trail_complete: bool,
) -> Vec<String> {
    let fda = match fda_status {
        ComplianceStatus::Compliant => {
            "FDA: record meets software as a medical device record-keeping requirements (21 CFR Part 820)"
        }
        ComplianceStatus::NonCompliant => {
            "FDA: diagnosis does not satisfy the configured policy for 21 CFR Part 820 record keeping"
        }
        ComplianceStatus::NeedsReview => {
            "FDA: status cannot be confirmed until the record signature verifies"
        }
    };
    let hipaa = match hipaa_status {
        ComplianceStatus::Compliant => "HIPAA: patient data anonymized per the HIPAA Privacy Rule",
        ComplianceStatus::NonCompliant => {
            "HIPAA: patient identifier does not satisfy the anonymization policy"
        }
        ComplianceStatus::NeedsReview => {
            "HIPAA: status cannot be confirmed until the record signature verifies"
        }
    };
    let signature = if signature_verified {
        "Cryptographic signature verified; record integrity confirmed"
    } else {
        "Cryptographic signature failed verification; record integrity cannot be confirmed"
    };
    let audit = if audit_trail_complete {
        "Audit trail complete: creation entry present"
    } else {
        "Audit trail incomplete: no creation entry found"
    };

    vec![fda, hipaa, signature, audit]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Derive the report for `record`. `audit_trail` is the record's audit
/// trail; `signature_verified` the outcome of a verification just performed.
pub fn evaluate_report(
    record: &DiagnosticRecord,
    audit_trail: &[AuditEntry],
    signature_verified: bool,
    generated_timestamp: u64,
) -> ComplianceReport {
    let flags = record.compliance_flags;
    let fda_status = ComplianceStatus::derive(flags.fda_compliant, signature_verified);
    let hipaa_status = ComplianceStatus::derive(flags.hipaa_compliant, signature_verified);
    let audit_trail_complete = audit_trail
        .iter()
        .any(|entry| entry.diagnosis_id == record.id && entry.action.is_creation());

    ComplianceReport {
        diagnosis_id: record.id,
        fda_status,
        hipaa_status,
        audit_trail_complete,
        signature_verified,
        regulatory_notes: regulatory_notes(
            fda_status,
            hipaa_status,
            signature_verified,
            audit_trail_complete,
        ),
        certification_level: certification_level(fda_status, hipaa_status, signature_verified)
            .to_string(),
        generated_timestamp,
    }
}
