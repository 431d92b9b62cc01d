//! Metadata validation rules.
//!
//! Validation is recoverable: it returns a structured report rather than
//! failing, so callers can render every problem at once.

use drift_core::ports::parse_iso_millis;

use crate::record::{MigrationMetadata, MigrationStatus};

/// One validation problem, with the offending field path.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Structured validation result.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn from_issues(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validates a metadata record.
///
/// Checks required fields, canonical timestamp form, non-negative counts,
/// and consistency between the status and its supporting sections.
pub fn validate(metadata: &MigrationMetadata) -> ValidationReport {
    let mut errors = Vec::new();

    if metadata.id.is_empty() {
        errors.push(ValidationIssue::new("id", "is required"));
    }
    if metadata.name.is_empty() {
        errors.push(ValidationIssue::new("name", "is required"));
    }

    check_timestamp(&mut errors, "generated", Some(&metadata.generated), true);

    if let Some(testing) = &metadata.testing {
        check_timestamp(&mut errors, "testing.tested_at", testing.tested_at.as_deref(), false);
        if testing.tests_passed < 0 {
            errors.push(ValidationIssue::new(
                "testing.tests_passed",
                "must not be negative",
            ));
        }
        if testing.tests_failed < 0 {
            errors.push(ValidationIssue::new(
                "testing.tests_failed",
                "must not be negative",
            ));
        }
    }

    if let Some(promotion) = &metadata.promotion {
        check_timestamp(
            &mut errors,
            "promotion.promoted_at",
            promotion.promoted_at.as_deref(),
            false,
        );
    }

    if let Some(generation) = &metadata.generation {
        check_timestamp(
            &mut errors,
            "generation.generated_at",
            Some(&generation.generated_at),
            true,
        );
    }

    // Status / section consistency.
    match metadata.status {
        MigrationStatus::Pending => {}
        MigrationStatus::Tested => {
            let testing = metadata.testing_or_default();
            if testing.tested_at.is_none() {
                errors.push(ValidationIssue::new(
                    "testing.tested_at",
                    "must be set for tested migrations",
                ));
            }
            if testing.tests_failed != 0 {
                errors.push(ValidationIssue::new(
                    "testing.tests_failed",
                    "must be zero for tested migrations",
                ));
            }
        }
        MigrationStatus::Promoted => {
            let promotion = metadata.promotion.clone().unwrap_or_default();
            if promotion.promoted_at.is_none() {
                errors.push(ValidationIssue::new(
                    "promotion.promoted_at",
                    "must be set for promoted migrations",
                ));
            }
            if promotion.promoted_by.is_none() {
                errors.push(ValidationIssue::new(
                    "promotion.promoted_by",
                    "must be set for promoted migrations",
                ));
            }
        }
    }

    ValidationReport::from_issues(errors)
}

fn check_timestamp(
    errors: &mut Vec<ValidationIssue>,
    field: &str,
    value: Option<&str>,
    required: bool,
) {
    match value {
        None => {
            if required {
                errors.push(ValidationIssue::new(field, "is required"));
            }
        }
        Some(s) if s.is_empty() => {
            errors.push(ValidationIssue::new(field, "is required"));
        }
        Some(s) => {
            if parse_iso_millis(s).is_none() {
                errors.push(ValidationIssue::new(
                    field,
                    format!("not a canonical ISO-8601 timestamp: {s}"),
                ));
            }
        }
    }
}
