//! Ledger Service
//!
//! Public operations over the ledger. A submission moves through
//! `Received -> Identified -> Signed -> Persisted -> Audited -> Complete`;
//! any failure ends it in `Failed` with nothing visible to readers.
//!
//! Every mutation, including the audit entry recorded by an auditable read,
//! commits in one transaction under `write_gate`. Signing happens before the
//! gate is taken.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::audit::{verify_chain, AuditAction, AuditEntry, AuditFilter, AuditLog, ChainVerification, NewAuditEntry};
use crate::compliance::{ComplianceEvaluator, CompliancePolicy, ComplianceReport, ThresholdPolicy};
use crate::config::AppConfig;
use crate::crypto::{build_signer, canonical_content, AttestationService, SigningOracle};
use crate::database::Database;
use crate::error::LedgerError;
use crate::ledger::clock::LedgerClock;
use crate::ledger::ids::{IdAllocator, Sequence};
use crate::ledger::store::LedgerStore;
use crate::ledger::types::{DiagnosticRecord, RecordSubmission};

pub const SIGNATURE_INVALID: &str = "SIGNATURE_INVALID";

/// Audit timestamps are assigned under the write gate so they follow id order.
const UNSTAMPED: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmissionState {
    Received,
    Identified,
    Signed,
    Persisted,
    Audited,
    Complete,
    Failed,
}

/// Result of re-checking every signature and the audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub records_checked: usize,
    pub invalid_signatures: Vec<u64>,
    /// Records with no creation entry in the audit trail.
    pub unaudited_records: Vec<u64>,
    pub audit_chain: ChainVerification,
}

impl IntegrityReport {
    pub fn is_intact(&self) -> bool {
        self.invalid_signatures.is_empty()
            && self.unaudited_records.is_empty()
            && self.audit_chain.is_valid()
    }
}

pub struct LedgerService {
    db: Database,
    allocator: IdAllocator,
    store: LedgerStore,
    audit: AuditLog,
    attestation: AttestationService,
    policy: Arc<dyn CompliancePolicy>,
    clock: LedgerClock,
    write_gate: Mutex<()>,
}

impl LedgerService {
    /// Wire the service over an already migrated database.
    pub fn new(
        db: Database,
        oracle: Arc<dyn SigningOracle>,
        policy: Arc<dyn CompliancePolicy>,
    ) -> Self {
        let allocator = IdAllocator::new();
        Self {
            store: LedgerStore::new(db.pool().clone()),
            audit: AuditLog::new(db.pool().clone(), allocator),
            attestation: AttestationService::new(oracle),
            allocator,
            policy,
            db,
            clock: LedgerClock::new(),
            write_gate: Mutex::new(()),
        }
    }

    /// Connect, migrate and wire the service.
    pub async fn open(
        database_url: &str,
        oracle: Arc<dyn SigningOracle>,
        policy: Arc<dyn CompliancePolicy>,
    ) -> Result<Self, LedgerError> {
        let db = Database::new(database_url).await?;
        db.run_migrations().await?;
        Ok(Self::new(db, oracle, policy))
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, LedgerError> {
        let oracle = build_signer(&config.signer)?;
        let policy = Arc::new(ThresholdPolicy::new(config.compliance.min_confidence));
        Self::open(&config.database_url, oracle, policy).await
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Sign and persist a new diagnostic record.
    pub async fn submit_record(
        &self,
        submission: RecordSubmission,
        actor: &str,
    ) -> Result<DiagnosticRecord, LedgerError> {
        let mut state = SubmissionState::Received;
        let result = self.run_submission(submission, actor, &mut state).await;

        match &result {
            Ok(record) => {
                info!("Diagnosis {} recorded by {}: {}", record.id, actor, record.content.diagnosis);
            }
            Err(e) => {
                warn!("Submission failed in state {:?}: {}", state, e);
                state = SubmissionState::Failed;
                debug!("Submission state -> {:?}", state);
            }
        }
        result
    }

    /// `submit_record` for a raw JSON payload.
    pub async fn submit_record_bytes(
        &self,
        bytes: &[u8],
        actor: &str,
    ) -> Result<DiagnosticRecord, LedgerError> {
        let submission = RecordSubmission::from_json_bytes(bytes)?;
        self.submit_record(submission, actor).await
    }

    async fn run_submission(
        &self,
        submission: RecordSubmission,
        actor: &str,
        state: &mut SubmissionState,
    ) -> Result<DiagnosticRecord, LedgerError> {
        let content = submission.content;
        content.validate()?;

        let id = self.allocator.next_id(self.db.pool(), Sequence::Diagnosis).await?;
        advance(state, SubmissionState::Identified, id);

        let created_at = self.clock.now_nanos();
        let compliance_flags = self.policy.evaluate(&content);
        let attestation = self.attestation.sign(&canonical_content(&content, created_at)).await?;
        advance(state, SubmissionState::Signed, id);

        let record = DiagnosticRecord {
            id,
            content,
            created_at,
            signature: attestation.signature,
            public_key: attestation.public_key,
            compliance_flags,
        };

        let mut creation = NewAuditEntry::new(
            id,
            AuditAction::DiagnosisCreated,
            UNSTAMPED,
            actor,
            format!("Diagnosis recorded: {}", record.content.diagnosis),
        );
        if !compliance_flags.fda_compliant {
            creation = creation.with_flag("FDA_NON_COMPLIANT");
        }
        if !compliance_flags.hipaa_compliant {
            creation = creation.with_flag("HIPAA_NON_COMPLIANT");
        }

        let _gate = self.write_gate.lock().await;
        creation.timestamp = self.clock.now_nanos();
        let mut tx = self.db.pool().begin().await?;
        self.store.insert(&mut *tx, &record).await?;
        advance(state, SubmissionState::Persisted, id);
        self.audit.append(&mut tx, creation).await?;
        advance(state, SubmissionState::Audited, id);
        tx.commit().await?;
        advance(state, SubmissionState::Complete, id);

        Ok(record)
    }

    pub async fn get_record(&self, id: u64) -> Result<Option<DiagnosticRecord>, LedgerError> {
        self.store.get(id).await
    }

    pub async fn list_records(&self) -> Result<Vec<DiagnosticRecord>, LedgerError> {
        self.store.list_all().await
    }

    pub async fn list_audit_trail(&self) -> Result<Vec<AuditEntry>, LedgerError> {
        self.audit.list_all().await
    }

    pub async fn list_audit_trail_filtered(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEntry>, LedgerError> {
        self.audit.list_filtered(filter).await
    }

    /// Audit trail of one record. Reading it is itself recorded, after the
    /// trail has been read. Unknown ids yield an empty trail and no entry.
    pub async fn list_audit_trail_for(
        &self,
        id: u64,
        actor: &str,
    ) -> Result<Vec<AuditEntry>, LedgerError> {
        let trail = self.audit.list_for(id).await?;
        if self.store.get(id).await?.is_some() {
            self.observe(NewAuditEntry::new(
                id,
                AuditAction::AuditTrailAccessed,
                UNSTAMPED,
                actor,
                format!("Audit trail viewed ({} entries)", trail.len()),
            ))
            .await?;
        }
        Ok(trail)
    }

    pub async fn verify_signature(&self, id: u64, actor: &str) -> Result<bool, LedgerError> {
        let record = self.store.get(id).await?.ok_or(LedgerError::NotFound(id))?;
        let verified = self.attestation.verify_record(&record);

        let mut entry = NewAuditEntry::new(
            id,
            AuditAction::SignatureVerified,
            UNSTAMPED,
            actor,
            if verified {
                "Signature verified against stored public key"
            } else {
                "Signature verification failed"
            },
        );
        if !verified {
            warn!("Signature of diagnosis {} does not verify", id);
            entry = entry.with_flag(SIGNATURE_INVALID);
        }
        self.observe(entry).await?;

        Ok(verified)
    }

    pub async fn generate_compliance_report(
        &self,
        id: u64,
        actor: &str,
    ) -> Result<ComplianceReport, LedgerError> {
        let evaluator = ComplianceEvaluator::new(&self.store, &self.audit, &self.attestation);
        let report = evaluator.evaluate(id, self.clock.now_nanos()).await?;

        let mut entry = NewAuditEntry::new(
            id,
            AuditAction::ComplianceReportGenerated,
            UNSTAMPED,
            actor,
            format!(
                "Compliance report generated: FDA {}, HIPAA {}, {}",
                report.fda_status, report.hipaa_status, report.certification_level
            ),
        );
        for flag in report.raised_flags() {
            entry = entry.with_flag(flag);
        }
        self.observe(entry).await?;

        Ok(report)
    }

    pub async fn health_check(&self) -> String {
        let counts = async { Ok::<_, LedgerError>((self.store.count().await?, self.audit.count().await?)) };
        match counts.await {
            Ok((diagnoses, audit_entries)) => format!(
                "Diagnostic Ledger Status: HEALTHY | Diagnoses: {} | Audit Entries: {} | Signer: {}",
                diagnoses,
                audit_entries,
                self.attestation.key_name()
            ),
            Err(e) => {
                warn!("Health check failed: {}", e);
                format!(
                    "Diagnostic Ledger Status: UNAVAILABLE | {} | Signer: {}",
                    e,
                    self.attestation.key_name()
                )
            }
        }
    }

    /// Re-verify every record signature and the audit hash chain.
    pub async fn verify_integrity(&self) -> Result<IntegrityReport, LedgerError> {
        let records = self.store.list_all().await?;
        let entries = self.audit.list_all().await?;

        let invalid_signatures = records
            .iter()
            .filter(|record| !self.attestation.verify_record(record))
            .map(|record| record.id)
            .collect();
        let unaudited_records = records
            .iter()
            .filter(|record| {
                !entries
                    .iter()
                    .any(|e| e.diagnosis_id == record.id && e.action.is_creation())
            })
            .map(|record| record.id)
            .collect();

        Ok(IntegrityReport {
            records_checked: records.len(),
            invalid_signatures,
            unaudited_records,
            audit_chain: verify_chain(&entries),
        })
    }

    /// Record an auditable read in its own transaction.
    async fn observe(&self, mut entry: NewAuditEntry) -> Result<AuditEntry, LedgerError> {
        let _gate = self.write_gate.lock().await;
        entry.timestamp = self.clock.now_nanos();
        let mut tx = self.db.pool().begin().await?;
        let sealed = self.audit.append(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(sealed)
    }
}

fn advance(state: &mut SubmissionState, next: SubmissionState, id: u64) {
    debug!("Diagnosis {}: {:?} -> {:?}", id, state, next);
    *state = next;
}
