//! Report types produced by the analyzer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ===========================================================================
// Ordinal scales
// ===========================================================================

/// Overall risk of an operation or plan. Ordered; aggregation takes the
/// maximum.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected load on the database while an operation runs.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceImpact {
    #[default]
    None,
    Low,
    Medium,
    High,
}

/// Severity attached to an analysis warning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    Info,
    Warning,
    High,
    Critical,
}

// ===========================================================================
// Recommendation / warning kinds
// ===========================================================================

/// What a recommendation asks the operator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationKind {
    Backup,
    TypeSafety,
    ConcurrentIndex,
    NullCheck,
    RlsTesting,
    FunctionTesting,
    MaintenanceWindow,
    Monitoring,
    StagingTest,
    RollbackPlan,
    PhasedDeployment,
    BlueGreenDeployment,
}

/// What an analysis warning is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    DataLoss,
    TypeConversion,
    IndexCreation,
    ConstraintFailure,
    Security,
}

// ===========================================================================
// Report structures
// ===========================================================================

/// One actionable recommendation. Priority shares the risk scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub priority: RiskLevel,
    pub message: String,
    /// The object the recommendation is about; absent for plan-wide advice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

/// One analysis warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWarning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub message: String,
    pub severity: WarningSeverity,
}

/// One entry of the rollback outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackEntry {
    pub description: String,
    /// `true` when no automatic inverse exists (restores, reverts).
    pub manual: bool,
}

/// Per-kind operation counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatistics {
    pub total: usize,
    pub destructive: usize,
    /// Operation kind -> count, keyed by the kind's wire name.
    pub by_kind: BTreeMap<String, usize>,
}

/// The analyzer's full verdict over an operation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationAnalysis {
    pub risk_level: RiskLevel,
    pub performance_impact: PerformanceImpact,
    pub estimated_duration_minutes: f64,
    pub recommendations: Vec<Recommendation>,
    pub warnings: Vec<AnalysisWarning>,
    pub statistics: OperationStatistics,
    pub requires_downtime: bool,
    pub rollback_plan: Vec<RollbackEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_scale_is_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert_eq!(
            RiskLevel::Low.max(RiskLevel::Critical),
            RiskLevel::Critical
        );
    }

    #[test]
    fn impact_scale_is_ordered() {
        assert!(PerformanceImpact::None < PerformanceImpact::Low);
        assert!(PerformanceImpact::Medium < PerformanceImpact::High);
    }

    #[test]
    fn kinds_serialize_screaming() {
        assert_eq!(
            serde_json::to_string(&RecommendationKind::ConcurrentIndex).unwrap(),
            r#""CONCURRENT_INDEX""#
        );
        assert_eq!(
            serde_json::to_string(&WarningKind::DataLoss).unwrap(),
            r#""DATA_LOSS""#
        );
    }

    #[test]
    fn recommendation_serializes_with_type_key() {
        let rec = Recommendation {
            kind: RecommendationKind::Backup,
            priority: RiskLevel::High,
            message: "Back up affected tables before running".into(),
            operation: Some("users".into()),
        };
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains(r#""type":"BACKUP""#));
        assert!(json.contains(r#""priority":"high""#));
    }
}
