//! The migration metadata record and its persisted JSON layout.
//!
//! Field names are part of the wire contract; timestamps are ISO-8601 UTC
//! strings with millisecond precision (`2025-08-28T12:00:00.000Z`).

use serde::{Deserialize, Serialize};
use std::fmt;

// ===========================================================================
// MigrationStatus
// ===========================================================================

/// Lifecycle status of a planned migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    #[default]
    Pending,
    Tested,
    Promoted,
}

impl MigrationStatus {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Tested => "tested",
            Self::Promoted => "promoted",
        }
    }

    /// Returns `true` if changing from `self` to `to` is a permitted edge of
    /// the status machine. Staying put is always permitted.
    pub fn can_transition_to(&self, to: MigrationStatus) -> bool {
        *self == to
            || matches!(
                (self, to),
                (Self::Pending, Self::Tested) | (Self::Tested, Self::Promoted)
            )
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===========================================================================
// Record sections
// ===========================================================================

/// Test attestation attached to a migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestingInfo {
    pub tested_at: Option<String>,

    #[serde(default)]
    pub tests_passed: i64,

    #[serde(default)]
    pub tests_failed: i64,
}

/// Promotion record attached to a migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionInfo {
    pub promoted_at: Option<String>,
    pub promoted_by: Option<String>,
}

/// Details of the planning cycle that produced the migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub generated_at: String,

    #[serde(default)]
    pub has_differences: bool,

    #[serde(default)]
    pub statement_count: usize,

    #[serde(default)]
    pub source_files_compiled: usize,

    #[serde(default)]
    pub generation_time_ms: u64,
}

// ===========================================================================
// MigrationMetadata
// ===========================================================================

/// Metadata record for one planned migration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationMetadata {
    pub id: String,

    pub name: String,

    /// When the record was created (ISO-8601).
    pub generated: String,

    #[serde(default)]
    pub status: MigrationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testing: Option<TestingInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PromotionInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationInfo>,
}

impl MigrationMetadata {
    /// The testing section, reading an absent section as all-default.
    pub fn testing_or_default(&self) -> TestingInfo {
        self.testing.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_machine_edges() {
        use MigrationStatus::*;
        assert!(Pending.can_transition_to(Tested));
        assert!(Tested.can_transition_to(Promoted));
        assert!(Pending.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Promoted));
        assert!(!Tested.can_transition_to(Pending));
        assert!(!Promoted.can_transition_to(Tested));
        assert!(!Promoted.can_transition_to(Pending));
    }

    #[test]
    fn status_serde_uses_lowercase_strings() {
        assert_eq!(
            serde_json::to_string(&MigrationStatus::Pending).unwrap(),
            r#""pending""#
        );
        let back: MigrationStatus = serde_json::from_str(r#""promoted""#).unwrap();
        assert_eq!(back, MigrationStatus::Promoted);
    }

    #[test]
    fn record_serde_roundtrip() {
        let record = MigrationMetadata {
            id: "20250828_1".into(),
            name: "add_users".into(),
            generated: "2025-08-28T12:00:00.000Z".into(),
            status: MigrationStatus::Tested,
            testing: Some(TestingInfo {
                tested_at: Some("2025-08-28T13:00:00.000Z".into()),
                tests_passed: 5,
                tests_failed: 0,
            }),
            promotion: Some(PromotionInfo::default()),
            generation: None,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""status":"tested""#));
        assert!(json.contains(r#""tests_passed":5"#));
        let back: MigrationMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn minimal_record_deserializes() {
        let json = r#"{"id":"m1","name":"n","generated":"2025-08-28T12:00:00.000Z"}"#;
        let record: MigrationMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, MigrationStatus::Pending);
        assert!(record.testing.is_none());
        assert!(record.promotion.is_none());
    }
}
