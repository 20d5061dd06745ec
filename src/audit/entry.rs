//! Audit Entry
//!
//! One immutable record of an action taken against the ledger, linked to its
//! predecessor by a SHA-256 hash chain.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Hash the first entry links to.
pub const GENESIS_HASH: &str =
    "sha256:0000000000000000000000000000000000000000000000000000000000000000";

/// Flags attached to every entry.
pub const FDA_AUDIT: &str = "FDA_AUDIT";
pub const HIPAA_LOG: &str = "HIPAA_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    DiagnosisCreated,
    SignatureVerified,
    ComplianceReportGenerated,
    AuditTrailAccessed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::DiagnosisCreated => "DIAGNOSIS_CREATED",
            AuditAction::SignatureVerified => "SIGNATURE_VERIFIED",
            AuditAction::ComplianceReportGenerated => "COMPLIANCE_REPORT_GENERATED",
            AuditAction::AuditTrailAccessed => "AUDIT_TRAIL_ACCESSED",
        }
    }

    pub fn is_creation(&self) -> bool {
        matches!(self, AuditAction::DiagnosisCreated)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DIAGNOSIS_CREATED" => Ok(AuditAction::DiagnosisCreated),
            "SIGNATURE_VERIFIED" => Ok(AuditAction::SignatureVerified),
            "COMPLIANCE_REPORT_GENERATED" => Ok(AuditAction::ComplianceReportGenerated),
            "AUDIT_TRAIL_ACCESSED" => Ok(AuditAction::AuditTrailAccessed),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

/// An entry before the log has assigned its id and chain position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub diagnosis_id: u64,
    pub action: AuditAction,
    pub timestamp: u64,
    pub actor: String,
    pub details: String,
    pub compliance_flags: Vec<String>,
}

impl NewAuditEntry {
    pub fn new(
        diagnosis_id: u64,
        action: AuditAction,
        timestamp: u64,
        actor: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            diagnosis_id,
            action,
            timestamp,
            actor: actor.into(),
            details: details.into(),
            compliance_flags: vec![FDA_AUDIT.to_string(), HIPAA_LOG.to_string()],
        }
    }

    /// Attach a flag raised by this action.
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        let flag = flag.into();
        if !self.compliance_flags.contains(&flag) {
            self.compliance_flags.push(flag);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub diagnosis_id: u64,
    pub action: AuditAction,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: u64,
    pub actor: String,
    pub details: String,
    pub compliance_flags: Vec<String>,
    pub previous_hash: String,
    pub entry_hash: String,
}

impl AuditEntry {
    pub fn seal(id: u64, entry: NewAuditEntry, previous_hash: String) -> Self {
        let mut sealed = Self {
            id,
            diagnosis_id: entry.diagnosis_id,
            action: entry.action,
            timestamp: entry.timestamp,
            actor: entry.actor,
            details: entry.details,
            compliance_flags: entry.compliance_flags,
            previous_hash,
            entry_hash: String::new(),
        };
        sealed.entry_hash = sealed.calculate_hash();
        sealed
    }

    /// Canonical string representation for hashing
    pub fn canonical_string(&self) -> String {
        format!(
            "id:{}|diagnosis_id:{}|action:{}|timestamp:{}|actor:{:?}|details:{:?}|compliance_flags:{:?}|previous_hash:{}",
            self.id,
            self.diagnosis_id,
            self.action,
            self.timestamp,
            self.actor,
            self.details,
            self.compliance_flags,
            self.previous_hash,
        )
    }

    pub fn calculate_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_string().as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    pub fn verify_hash(&self) -> bool {
        self.entry_hash == self.calculate_hash()
    }

    pub fn summary(&self) -> String {
        format!(
            "#{} {} on diagnosis {} by {}",
            self.id, self.action, self.diagnosis_id, self.actor
        )
    }
}
