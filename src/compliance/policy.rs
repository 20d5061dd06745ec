//! Creation-time compliance policy
//!
//! A policy maps diagnosis content to the two flags stored on the record. The
//! flags are computed once and never re-evaluated, so a policy must be a pure
//! function of the content.

use crate::ledger::types::{ComplianceFlags, DiagnosisContent};

pub trait CompliancePolicy: Send + Sync {
    fn evaluate(&self, content: &DiagnosisContent) -> ComplianceFlags;
}

/// Default policy.
///
/// - `fda_compliant`: overall confidence at or above `min_confidence` and at
///   least one finding backing the diagnosis.
/// - `hipaa_compliant`: the anonymized patient id is present and does not
///   repeat any other metadata value.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdPolicy {
    pub min_confidence: f32,
}

impl ThresholdPolicy {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl CompliancePolicy for ThresholdPolicy {
    fn evaluate(&self, content: &DiagnosisContent) -> ComplianceFlags {
        let fda_compliant =
            content.confidence_score >= self.min_confidence && !content.findings.is_empty();

        let patient = &content.patient;
        let id = patient.anonymized_id.trim();
        let hipaa_compliant = !id.is_empty()
            && [&patient.age_range, &patient.study_type, &patient.acquisition_date]
                .iter()
                .all(|other| other.trim() != id);

        ComplianceFlags {
            fda_compliant,
            hipaa_compliant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::{MedicalFinding, PatientMetadata, Severity};

    fn content(confidence: f32, findings: usize) -> DiagnosisContent {
        DiagnosisContent {
            diagnosis: "Possible pleural effusion - Suggest further imaging".to_string(),
            findings: (0..findings)
                .map(|_| MedicalFinding {
                    finding: "Blunted costophrenic angle".to_string(),
                    location: "Right lateral".to_string(),
                    severity: Severity::Mild,
                    confidence: 0.78,
                })
                .collect(),
            confidence_score: confidence,
            model_version: "MedicalAI-v2.1.0".to_string(),
            patient: PatientMetadata {
                anonymized_id: "ANON-204".to_string(),
                age_range: "30-40".to_string(),
                study_type: "Chest X-Ray".to_string(),
                acquisition_date: "2024-05-02".to_string(),
            },
        }
    }

    #[test]
    fn test_confident_diagnosis_with_findings_is_fda_compliant() {
        let flags = ThresholdPolicy::default().evaluate(&content(0.78, 1));
        assert!(flags.fda_compliant);
        assert!(flags.hipaa_compliant);
    }

    #[test]
    fn test_low_confidence_or_no_findings_is_not_fda_compliant() {
        let policy = ThresholdPolicy::new(0.8);
        assert!(!policy.evaluate(&content(0.78, 1)).fda_compliant);
        assert!(!policy.evaluate(&content(0.95, 0)).fda_compliant);
        assert!(policy.evaluate(&content(0.8, 2)).fda_compliant);
    }

    #[test]
    fn test_identifier_repeated_in_metadata_is_not_hipaa_compliant() {
        let mut c = content(0.9, 1);
        c.patient.study_type = c.patient.anonymized_id.clone();
        assert!(!ThresholdPolicy::default().evaluate(&c).hipaa_compliant);
    }

    #[test]
    fn test_policy_is_deterministic() {
        let policy = ThresholdPolicy::default();
        let c = content(0.6, 1);
        assert_eq!(policy.evaluate(&c), policy.evaluate(&c));
    }
}
