//! Audit Chain Verification
//!
//! Recomputes every entry hash and checks each link to its predecessor.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::entry::{AuditEntry, GENESIS_HASH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub entry_count: usize,
    /// Id of the first entry that fails verification.
    pub broken_at: Option<u64>,
    pub error_message: Option<String>,
}

impl ChainVerification {
    pub fn is_valid(&self) -> bool {
        self.broken_at.is_none()
    }

    fn broken(entry_count: usize, id: u64, message: String) -> Self {
        warn!("Audit chain broken at entry {}: {}", id, message);
        Self {
            entry_count,
            broken_at: Some(id),
            error_message: Some(message),
        }
    }
}

/// Verify entries given in id order. An empty log is trivially valid.
pub fn verify_chain(entries: &[AuditEntry]) -> ChainVerification {
    let mut expected_previous: &str = GENESIS_HASH;
    let mut last_id = 0;

    for entry in entries {
        if entry.id <= last_id {
            return ChainVerification::broken(
                entries.len(),
                entry.id,
                format!("id {} does not follow {}", entry.id, last_id),
            );
        }
        if entry.previous_hash != expected_previous {
            return ChainVerification::broken(
                entries.len(),
                entry.id,
                format!(
                    "expected previous hash {}, got {}",
                    expected_previous, entry.previous_hash
                ),
            );
        }
        if !entry.verify_hash() {
            return ChainVerification::broken(
                entries.len(),
                entry.id,
                "entry hash does not match its contents".to_string(),
            );
        }

        expected_previous = entry.entry_hash.as_str();
        last_id = entry.id;
    }

    info!("Audit chain verification successful: {} entries", entries.len());
    ChainVerification {
        entry_count: entries.len(),
        broken_at: None,
        error_message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{AuditAction, NewAuditEntry};

    fn chain(len: u64) -> Vec<AuditEntry> {
        let mut entries: Vec<AuditEntry> = Vec::new();
        for id in 1..=len {
            let previous = entries
                .last()
                .map(|e| e.entry_hash.clone())
                .unwrap_or_else(|| GENESIS_HASH.to_string());
            let entry = NewAuditEntry::new(id, AuditAction::DiagnosisCreated, id * 10, "actor", "d");
            entries.push(AuditEntry::seal(id, entry, previous));
        }
        entries
    }

    #[test]
    fn test_valid_chain() {
        let result = verify_chain(&chain(5));
        assert!(result.is_valid());
        assert_eq!(result.entry_count, 5);
        assert!(verify_chain(&[]).is_valid());
    }

    #[test]
    fn test_edited_entry_detected() {
        let mut entries = chain(4);
        entries[2].actor = "intruder".to_string();

        let result = verify_chain(&entries);
        assert_eq!(result.broken_at, Some(3));
    }

    #[test]
    fn test_removed_entry_detected() {
        let mut entries = chain(4);
        entries.remove(1);

        let result = verify_chain(&entries);
        assert_eq!(result.broken_at, Some(3));
    }

    #[test]
    fn test_reordered_entries_detected() {
        let mut entries = chain(3);
        entries.swap(1, 2);
        assert!(!verify_chain(&entries).is_valid());
    }
}
