//! Lifecycle operations: creation, partial update, test attestation,
//! promotion, and readiness checks.

use drift_core::ports::{ClockPort, iso_millis};

use crate::error::{MetadataError, Result};
use crate::patch::MetadataPatch;
use crate::record::{
    MigrationMetadata, MigrationStatus, PromotionInfo, TestingInfo,
};
use crate::validate::validate;

/// Creates a fresh pending record with nulled testing and promotion
/// sections.
pub fn create_default(
    id: impl Into<String>,
    name: impl Into<String>,
    clock: &impl ClockPort,
) -> Result<MigrationMetadata> {
    let id = id.into();
    let name = name.into();
    if id.is_empty() {
        return Err(MetadataError::MissingField { field: "id".into() });
    }
    if name.is_empty() {
        return Err(MetadataError::MissingField {
            field: "name".into(),
        });
    }

    Ok(MigrationMetadata {
        id,
        name,
        generated: iso_millis(&clock.now()),
        status: MigrationStatus::Pending,
        testing: Some(TestingInfo::default()),
        promotion: Some(PromotionInfo::default()),
        generation: None,
    })
}

/// Applies a typed patch and validates the merged record.
///
/// The input record is never mutated. Status changes outside the permitted
/// machine fail fast with [`MetadataError::InvalidTransition`]; any other
/// inconsistency in the merged record surfaces as
/// [`MetadataError::Validation`].
pub fn update(existing: &MigrationMetadata, patch: &MetadataPatch) -> Result<MigrationMetadata> {
    if let Some(to) = patch.status {
        if !existing.status.can_transition_to(to) {
            return Err(MetadataError::InvalidTransition {
                from: existing.status,
                to,
            });
        }
    }

    let merged = patch.apply(existing);
    let report = validate(&merged);
    if !report.valid {
        return Err(MetadataError::Validation {
            issues: report.errors,
        });
    }
    Ok(merged)
}

/// Records a test run: zero failures move the migration to `tested`, any
/// failure keeps (or returns) it to `pending`.
pub fn update_test_results(
    existing: &MigrationMetadata,
    passed: i64,
    failed: i64,
    clock: &impl ClockPort,
) -> Result<MigrationMetadata> {
    if passed < 0 {
        return Err(MetadataError::NegativeCount {
            field: "tests_passed".into(),
            value: passed,
        });
    }
    if failed < 0 {
        return Err(MetadataError::NegativeCount {
            field: "tests_failed".into(),
            value: failed,
        });
    }
    // A promoted migration is immutable with respect to test results.
    if existing.status == MigrationStatus::Promoted {
        return Err(MetadataError::InvalidTransition {
            from: existing.status,
            to: MigrationStatus::Tested,
        });
    }

    let mut updated = existing.clone();
    updated.status = if failed == 0 {
        MigrationStatus::Tested
    } else {
        MigrationStatus::Pending
    };
    updated.testing = Some(TestingInfo {
        tested_at: Some(iso_millis(&clock.now())),
        tests_passed: passed,
        tests_failed: failed,
    });
    Ok(updated)
}

/// Promotes a tested migration. Only valid from `tested`.
pub fn update_promotion(
    existing: &MigrationMetadata,
    promoted_by: impl Into<String>,
    clock: &impl ClockPort,
) -> Result<MigrationMetadata> {
    let promoted_by = promoted_by.into();
    if promoted_by.is_empty() {
        return Err(MetadataError::MissingField {
            field: "promoted_by".into(),
        });
    }
    if existing.status != MigrationStatus::Tested {
        return Err(MetadataError::InvalidTransition {
            from: existing.status,
            to: MigrationStatus::Promoted,
        });
    }

    let mut updated = existing.clone();
    updated.status = MigrationStatus::Promoted;
    updated.promotion = Some(PromotionInfo {
        promoted_at: Some(iso_millis(&clock.now())),
        promoted_by: Some(promoted_by),
    });
    Ok(updated)
}

/// Whether a migration may be promoted, with the blocking reason when not.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PromotionReadiness {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A migration is promotable when it is tested, attested, and failure-free.
pub fn check_promotion_readiness(metadata: &MigrationMetadata) -> PromotionReadiness {
    let not_ready = |reason: &str| PromotionReadiness {
        ready: false,
        reason: Some(reason.to_owned()),
    };

    if metadata.status != MigrationStatus::Tested {
        return not_ready(&format!(
            "status is {}, expected tested",
            metadata.status
        ));
    }
    let testing = metadata.testing_or_default();
    if testing.tested_at.is_none() {
        return not_ready("migration has no test attestation");
    }
    if testing.tests_failed != 0 {
        return not_ready("migration has failing tests");
    }

    PromotionReadiness {
        ready: true,
        reason: None,
    }
}
