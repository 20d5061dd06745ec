#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use diagnostic_ledger::compliance::ThresholdPolicy;
use diagnostic_ledger::crypto::{Attestation, LocalKeySigner, SigningOracle};
use diagnostic_ledger::database::Database;
use diagnostic_ledger::ledger::{
    DiagnosisContent, MedicalFinding, PatientMetadata, RecordSubmission, Severity,
};
use diagnostic_ledger::{LedgerError, LedgerService};

/// Setup an in-memory SQLite database for testing
pub async fn setup_test_db() -> Database {
    let db = Database::new_in_memory()
        .await
        .expect("Failed to create test database");
    db.run_migrations().await.expect("Failed to migrate test database");
    db
}

/// Ledger service over an in-memory database and a fresh local key
pub async fn setup_test_service() -> LedgerService {
    setup_service_with(Arc::new(LocalKeySigner::generate("test_signing_key"))).await
}

pub async fn setup_service_with(oracle: Arc<dyn SigningOracle>) -> LedgerService {
    LedgerService::new(
        setup_test_db().await,
        oracle,
        Arc::new(ThresholdPolicy::default()),
    )
}

/// Oracle that can be taken offline mid-test
pub struct SwitchableOracle {
    inner: LocalKeySigner,
    online: AtomicBool,
}

impl SwitchableOracle {
    pub fn new() -> Self {
        Self {
            inner: LocalKeySigner::generate("switchable_key"),
            online: AtomicBool::new(true),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl SigningOracle for SwitchableOracle {
    async fn sign(&self, message: &[u8]) -> Result<Attestation, LedgerError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(LedgerError::SigningUnavailable("oracle offline".to_string()));
        }
        self.inner.sign(message).await
    }

    fn key_name(&self) -> &str {
        self.inner.key_name()
    }
}

pub fn create_test_patient(anonymized_id: &str) -> PatientMetadata {
    PatientMetadata {
        anonymized_id: anonymized_id.to_string(),
        age_range: "40-49".to_string(),
        study_type: "Chest X-Ray".to_string(),
        acquisition_date: "2024-03-14".to_string(),
    }
}

pub fn create_test_content(diagnosis: &str, confidence_score: f32) -> DiagnosisContent {
    DiagnosisContent {
        diagnosis: diagnosis.to_string(),
        findings: vec![MedicalFinding {
            finding: "Consolidation".to_string(),
            location: "Right lower lobe".to_string(),
            severity: Severity::Moderate,
            confidence: confidence_score,
        }],
        confidence_score,
        model_version: "radiology-v2.3".to_string(),
        patient: create_test_patient("ANON-7F3A"),
    }
}

/// The reference submission used across scenarios
pub fn pneumonia_submission() -> RecordSubmission {
    RecordSubmission::new(create_test_content("Pneumonia, right lower lobe", 0.87))
}
