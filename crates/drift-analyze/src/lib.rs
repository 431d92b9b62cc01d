//! Risk and performance analysis of migration plans.
//!
//! The analyzer annotates an operation set with severity, performance
//! impact, duration estimates, and remediation recommendations. Matching is
//! case-insensitive token/substring analysis over the operation SQL; there
//! is deliberately no SQL parser here.

pub mod analyzer;
pub mod report;
