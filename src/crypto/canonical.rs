//! Canonical byte encoding of a record's signed fields
//!
//! Every signature ever issued by the ledger covers exactly these bytes, so
//! the layout is frozen. A new layout needs a new domain tag and a new
//! function next to this one; existing records keep verifying against v1.
//!
//! Layout (v1):
//!
//! ```text
//! domain tag  "diagnostic-ledger/canonical/v1"
//! u32 BE len | diagnosis (UTF-8)
//! u32 BE     | confidence_score as IEEE-754 f32 bits
//! u64 BE     | created_at (ns since Unix epoch)
//! u32 BE len | patient anonymized id (UTF-8)
//! ```

use crate::ledger::types::{DiagnosisContent, DiagnosticRecord};

pub const CANONICAL_DOMAIN_V1: &[u8] = b"diagnostic-ledger/canonical/v1";

pub fn canonicalize(
    diagnosis: &str,
    confidence_score: f32,
    created_at: u64,
    anonymized_id: &str,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        CANONICAL_DOMAIN_V1.len() + 4 + diagnosis.len() + 4 + 8 + 4 + anonymized_id.len(),
    );
    out.extend_from_slice(CANONICAL_DOMAIN_V1);
    put_str(&mut out, diagnosis);
    out.extend_from_slice(&confidence_score.to_bits().to_be_bytes());
    out.extend_from_slice(&created_at.to_be_bytes());
    put_str(&mut out, anonymized_id);
    out
}

pub fn canonical_content(content: &DiagnosisContent, created_at: u64) -> Vec<u8> {
    canonicalize(
        &content.diagnosis,
        content.confidence_score,
        created_at,
        &content.patient.anonymized_id,
    )
}

pub fn canonical_record(record: &DiagnosticRecord) -> Vec<u8> {
    canonical_content(&record.content, record.created_at)
}

fn put_str(out: &mut Vec<u8>, value: &str) {
    // Strings longer than u32::MAX bytes cannot reach here: submissions are
    // bounded far below that by the transport.
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_layout_is_stable() {
        let bytes = canonicalize("Pneumonia", 0.87, 1, "A1");

        let mut expected = b"diagnostic-ledger/canonical/v1".to_vec();
        expected.extend_from_slice(&[0, 0, 0, 9]);
        expected.extend_from_slice(b"Pneumonia");
        expected.extend_from_slice(&0.87f32.to_bits().to_be_bytes());
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
        expected.extend_from_slice(&[0, 0, 0, 2]);
        expected.extend_from_slice(b"A1");

        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_canonicalization_is_deterministic() {
        let a = canonicalize("Normal chest X-ray", 0.92, 1_700_000_000_123_456_789, "ANON-1");
        let b = canonicalize("Normal chest X-ray", 0.92, 1_700_000_000_123_456_789, "ANON-1");
        assert_eq!(a, b);
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        // Shifting text between adjacent string fields must change the bytes.
        let a = canonicalize("ab|", 0.5, 7, "c");
        let b = canonicalize("ab", 0.5, 7, "|c");
        assert_ne!(a, b);
    }

    #[test]
    fn test_every_signed_field_matters() {
        let base = canonicalize("Cardiomegaly", 0.85, 10, "P-1");
        assert_ne!(base, canonicalize("Cardiomegaly.", 0.85, 10, "P-1"));
        assert_ne!(base, canonicalize("Cardiomegaly", 0.86, 10, "P-1"));
        assert_ne!(base, canonicalize("Cardiomegaly", 0.85, 11, "P-1"));
        assert_ne!(base, canonicalize("Cardiomegaly", 0.85, 10, "P-2"));
    }
}
