//! Audit Log System
//!
//! Append-only record of every interaction with the ledger, chained with
//! SHA-256 hashes so edits and removals are detectable.

pub mod entry;
pub mod log;
pub mod verify;

pub use entry::{AuditAction, AuditEntry, NewAuditEntry, FDA_AUDIT, GENESIS_HASH, HIPAA_LOG};
pub use log::{AuditFilter, AuditLog};
pub use verify::{verify_chain, ChainVerification};
