//! Typed partial updates for metadata records.
//!
//! Only `Some` fields are applied; `None` fields are left unchanged. Section
//! patches merge field-wise; nullable fields use `Option<Option<_>>` so a
//! patch can distinguish "leave alone" from "clear". This avoids the untyped
//! deep-merge-of-JSON pattern from the original tool.

use crate::record::{GenerationInfo, MigrationMetadata, MigrationStatus, PromotionInfo, TestingInfo};

/// Partial update for the testing section.
#[derive(Debug, Clone, Default)]
pub struct TestingPatch {
    pub tested_at: Option<Option<String>>,
    pub tests_passed: Option<i64>,
    pub tests_failed: Option<i64>,
}

/// Partial update for the promotion section.
#[derive(Debug, Clone, Default)]
pub struct PromotionPatch {
    pub promoted_at: Option<Option<String>>,
    pub promoted_by: Option<Option<String>>,
}

/// Partial update for the generation section.
#[derive(Debug, Clone, Default)]
pub struct GenerationPatch {
    pub generated_at: Option<String>,
    pub has_differences: Option<bool>,
    pub statement_count: Option<usize>,
    pub source_files_compiled: Option<usize>,
    pub generation_time_ms: Option<u64>,
}

/// Typed partial update for a metadata record.
///
/// The record id is identity and cannot be patched.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub name: Option<String>,
    pub generated: Option<String>,
    pub status: Option<MigrationStatus>,
    pub testing: Option<TestingPatch>,
    pub promotion: Option<PromotionPatch>,
    pub generation: Option<GenerationPatch>,
}

impl MetadataPatch {
    /// Applies the patch to a copy of `existing`; the input is untouched.
    pub fn apply(&self, existing: &MigrationMetadata) -> MigrationMetadata {
        let mut merged = existing.clone();

        if let Some(name) = &self.name {
            merged.name = name.clone();
        }
        if let Some(generated) = &self.generated {
            merged.generated = generated.clone();
        }
        if let Some(status) = self.status {
            merged.status = status;
        }

        if let Some(patch) = &self.testing {
            let mut section = merged.testing.take().unwrap_or_default();
            apply_testing(&mut section, patch);
            merged.testing = Some(section);
        }
        if let Some(patch) = &self.promotion {
            let mut section = merged.promotion.take().unwrap_or_default();
            apply_promotion(&mut section, patch);
            merged.promotion = Some(section);
        }
        if let Some(patch) = &self.generation {
            let mut section = merged.generation.take().unwrap_or_default();
            apply_generation(&mut section, patch);
            merged.generation = Some(section);
        }

        merged
    }
}

fn apply_testing(section: &mut TestingInfo, patch: &TestingPatch) {
    if let Some(tested_at) = &patch.tested_at {
        section.tested_at = tested_at.clone();
    }
    if let Some(passed) = patch.tests_passed {
        section.tests_passed = passed;
    }
    if let Some(failed) = patch.tests_failed {
        section.tests_failed = failed;
    }
}

fn apply_promotion(section: &mut PromotionInfo, patch: &PromotionPatch) {
    if let Some(promoted_at) = &patch.promoted_at {
        section.promoted_at = promoted_at.clone();
    }
    if let Some(promoted_by) = &patch.promoted_by {
        section.promoted_by = promoted_by.clone();
    }
}

fn apply_generation(section: &mut GenerationInfo, patch: &GenerationPatch) {
    if let Some(generated_at) = &patch.generated_at {
        section.generated_at = generated_at.clone();
    }
    if let Some(has_differences) = patch.has_differences {
        section.has_differences = has_differences;
    }
    if let Some(statement_count) = patch.statement_count {
        section.statement_count = statement_count;
    }
    if let Some(source_files_compiled) = patch.source_files_compiled {
        section.source_files_compiled = source_files_compiled;
    }
    if let Some(generation_time_ms) = patch.generation_time_ms {
        section.generation_time_ms = generation_time_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MigrationMetadata {
        MigrationMetadata {
            id: "m1".into(),
            name: "add_users".into(),
            generated: "2025-08-28T12:00:00.000Z".into(),
            status: MigrationStatus::Pending,
            testing: Some(TestingInfo {
                tested_at: None,
                tests_passed: 2,
                tests_failed: 1,
            }),
            promotion: None,
            generation: None,
        }
    }

    #[test]
    fn empty_patch_is_identity() {
        let existing = record();
        let merged = MetadataPatch::default().apply(&existing);
        assert_eq!(merged, existing);
    }

    #[test]
    fn patch_does_not_mutate_input() {
        let existing = record();
        let patch = MetadataPatch {
            name: Some("renamed".into()),
            ..MetadataPatch::default()
        };
        let merged = patch.apply(&existing);
        assert_eq!(existing.name, "add_users");
        assert_eq!(merged.name, "renamed");
    }

    #[test]
    fn section_patch_merges_field_wise() {
        let patch = MetadataPatch {
            testing: Some(TestingPatch {
                tests_failed: Some(0),
                ..TestingPatch::default()
            }),
            ..MetadataPatch::default()
        };
        let merged = patch.apply(&record());
        let testing = merged.testing.unwrap();
        // Untouched fields survive; only the patched one changes.
        assert_eq!(testing.tests_passed, 2);
        assert_eq!(testing.tests_failed, 0);
        assert_eq!(testing.tested_at, None);
    }

    #[test]
    fn section_patch_creates_missing_section() {
        let patch = MetadataPatch {
            promotion: Some(PromotionPatch {
                promoted_by: Some(Some("alice".into())),
                ..PromotionPatch::default()
            }),
            ..MetadataPatch::default()
        };
        let merged = patch.apply(&record());
        assert_eq!(
            merged.promotion.unwrap().promoted_by,
            Some("alice".to_owned())
        );
    }

    #[test]
    fn nullable_field_can_be_cleared() {
        let mut existing = record();
        existing.testing = Some(TestingInfo {
            tested_at: Some("2025-08-28T13:00:00.000Z".into()),
            tests_passed: 2,
            tests_failed: 0,
        });
        let patch = MetadataPatch {
            testing: Some(TestingPatch {
                tested_at: Some(None),
                ..TestingPatch::default()
            }),
            ..MetadataPatch::default()
        };
        let merged = patch.apply(&existing);
        assert_eq!(merged.testing.unwrap().tested_at, None);
    }
}
