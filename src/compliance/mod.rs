//! Compliance evaluation: creation-time flags and on-demand reports.

pub mod evaluator;
pub mod policy;
pub mod report;

pub use evaluator::ComplianceEvaluator;
pub use policy::{CompliancePolicy, ThresholdPolicy};
pub use report::{evaluate_report, ComplianceReport, ComplianceStatus};
