//! The diagnostic ledger: record types, id allocation, storage and the
//! service façade that orchestrates them.

pub mod clock;
pub mod ids;
pub mod service;
pub mod store;
pub mod types;

pub use ids::{IdAllocator, Sequence};
pub use service::{IntegrityReport, LedgerService};
pub use store::LedgerStore;
pub use types::{
    ComplianceFlags, DiagnosisContent, DiagnosticRecord, MedicalFinding, PatientMetadata,
    RecordSubmission, Severity,
};
