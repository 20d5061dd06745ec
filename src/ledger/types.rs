use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;

/// Anonymized patient context supplied with a diagnosis. The values are
/// opaque to the ledger and are never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientMetadata {
    pub anonymized_id: String,
    pub age_range: String,
    pub study_type: String,
    pub acquisition_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "Normal",
            Severity::Mild => "Mild",
            Severity::Moderate => "Moderate",
            Severity::Severe => "Severe",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalFinding {
    pub finding: String,
    pub location: String,
    pub severity: Severity,
    pub confidence: f32,
}

/// Diagnosis content as produced by an external analysis step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisContent {
    pub diagnosis: String,
    pub findings: Vec<MedicalFinding>,
    pub confidence_score: f32,
    pub model_version: String,
    pub patient: PatientMetadata,
}

impl DiagnosisContent {
    /// Reject malformed content before any identifier is spent on it.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.diagnosis.trim().is_empty() {
            return Err(LedgerError::empty_field("diagnosis"));
        }
        if self.model_version.trim().is_empty() {
            return Err(LedgerError::empty_field("model_version"));
        }
        if self.patient.anonymized_id.trim().is_empty() {
            return Err(LedgerError::empty_field("patient.anonymized_id"));
        }
        check_confidence("confidence_score", self.confidence_score)?;
        for (index, finding) in self.findings.iter().enumerate() {
            if finding.finding.trim().is_empty() {
                return Err(LedgerError::empty_field(&format!("findings[{}].finding", index)));
            }
            check_confidence(&format!("findings[{}].confidence", index), finding.confidence)?;
        }
        Ok(())
    }
}

fn check_confidence(field: &str, value: f32) -> Result<(), LedgerError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(LedgerError::invalid_confidence(field, value))
    }
}

/// Flags fixed at creation time by the compliance policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComplianceFlags {
    pub fda_compliant: bool,
    pub hipaa_compliant: bool,
}

/// A signed entry in the ledger. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub id: u64,
    pub content: DiagnosisContent,
    /// Nanoseconds since the Unix epoch.
    pub created_at: u64,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    pub compliance_flags: ComplianceFlags,
}

impl DiagnosticRecord {
    pub fn summary(&self) -> String {
        format!(
            "#{} {} ({:.2}, model {})",
            self.id, self.content.diagnosis, self.content.confidence_score, self.content.model_version
        )
    }
}

/// Caller-supplied payload for `submit_record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSubmission {
    pub content: DiagnosisContent,
}

impl RecordSubmission {
    pub fn new(content: DiagnosisContent) -> Self {
        Self { content }
    }

    /// Parse a submission from raw JSON bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        serde_json::from_slice(bytes)
            .map_err(|e| LedgerError::InvalidInput(format!("Malformed submission: {}", e)))
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}
