//! Metadata error types.

use crate::record::MigrationStatus;
use crate::validate::ValidationIssue;

/// Errors raised by metadata operations.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// A required field was empty or absent.
    #[error("missing required field: {field}")]
    MissingField {
        /// Path of the offending field.
        field: String,
    },

    /// A timestamp string did not round-trip through the canonical ISO-8601
    /// form.
    #[error("invalid timestamp in {field}: {value}")]
    InvalidTimestamp { field: String, value: String },

    /// A test count was negative.
    #[error("negative count in {field}: {value}")]
    NegativeCount { field: String, value: i64 },

    /// A status change outside pending -> tested -> promoted.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: MigrationStatus,
        to: MigrationStatus,
    },

    /// The merged record failed validation.
    #[error("metadata validation failed: {}", format_issues(.issues))]
    Validation { issues: Vec<ValidationIssue> },
}

/// Convenience alias for metadata operations.
pub type Result<T> = std::result::Result<T, MetadataError>;

impl MetadataError {
    /// Returns `true` if this is an [`MetadataError::InvalidTransition`].
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.field, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}
