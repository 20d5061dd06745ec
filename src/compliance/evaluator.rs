use crate::audit::AuditLog;
use crate::compliance::report::{evaluate_report, ComplianceReport};
use crate::crypto::AttestationService;
use crate::error::LedgerError;
use crate::ledger::store::LedgerStore;

/// Read-only view over ledger and audit state that derives compliance
/// reports. Recording that a report was generated is the caller's job.
pub struct ComplianceEvaluator<'a> {
    store: &'a LedgerStore,
    audit: &'a AuditLog,
    attestation: &'a AttestationService,
}

impl<'a> ComplianceEvaluator<'a> {
    pub fn new(store: &'a LedgerStore, audit: &'a AuditLog, attestation: &'a AttestationService) -> Self {
        Self {
            store,
            audit,
            attestation,
        }
    }

    pub async fn evaluate(
        &self,
        diagnosis_id: u64,
        generated_timestamp: u64,
    ) -> Result<ComplianceReport, LedgerError> {
        let record = self
            .store
            .get(diagnosis_id)
            .await?
            .ok_or(LedgerError::NotFound(diagnosis_id))?;
        let audit_trail = self.audit.list_for(diagnosis_id).await?;
        let signature_verified = self.attestation.verify_record(&record);

        Ok(evaluate_report(
            &record,
            &audit_trail,
            signature_verified,
            generated_timestamp,
        ))
    }
}
