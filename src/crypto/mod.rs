//! Attestation: canonical encoding, signing and verification of records.

pub mod canonical;
pub mod signatures;
pub mod signer;

use std::sync::Arc;
use tracing::warn;

pub use canonical::{canonical_content, canonical_record, canonicalize};
pub use signatures::SignatureManager;
pub use signer::{build_signer, Attestation, LocalKeySigner, RemoteSigner, SigningOracle};

use crate::error::LedgerError;
use crate::ledger::types::DiagnosticRecord;

/// Signs canonical bytes through the configured oracle and verifies
/// signatures locally.
pub struct AttestationService {
    oracle: Arc<dyn SigningOracle>,
    manager: SignatureManager,
}

impl AttestationService {
    pub fn new(oracle: Arc<dyn SigningOracle>) -> Self {
        Self {
            oracle,
            manager: SignatureManager::new(),
        }
    }

    /// Obtain an attestation and check it before handing it out, so an
    /// unsigned or wrongly signed record can never be persisted.
    pub async fn sign(&self, canonical_bytes: &[u8]) -> Result<Attestation, LedgerError> {
        let attestation = self.oracle.sign(canonical_bytes).await?;

        if !self.verify(canonical_bytes, &attestation.signature, &attestation.public_key) {
            warn!(
                "Signing oracle '{}' returned material that does not verify",
                self.oracle.key_name()
            );
            return Err(LedgerError::SigningUnavailable(
                "Signing oracle returned an invalid signature".to_string(),
            ));
        }

        Ok(attestation)
    }

    pub fn verify(&self, canonical_bytes: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        self.manager.verify_signature(canonical_bytes, signature, public_key)
    }

    /// Re-check a stored record against its own signature and key.
    pub fn verify_record(&self, record: &DiagnosticRecord) -> bool {
        self.verify(&canonical_record(record), &record.signature, &record.public_key)
    }

    pub fn key_name(&self) -> &str {
        self.oracle.key_name()
    }
}
