//! The schema diff analyzer: per-operation rules plus aggregation.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use drift_core::enums::OperationKind;
use drift_core::operation::MigrationOperation;

use crate::report::{
    AnalysisWarning, MigrationAnalysis, OperationStatistics, PerformanceImpact, Recommendation,
    RecommendationKind, RiskLevel, RollbackEntry, WarningKind, WarningSeverity,
};

/// Row count above which index creation estimates scale logarithmically.
const LARGE_TABLE_ROWS: u64 = 100_000;

/// Total duration above which a monitoring recommendation is added.
const MONITORING_THRESHOLD_MINUTES: f64 = 30.0;

/// Floor for any single operation's duration estimate.
const MIN_OP_MINUTES: f64 = 0.1;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Known statistics for one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub rows: u64,
}

/// Environment context the analyzer runs against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerContext {
    pub is_prod: bool,

    /// Table name -> stats, when the caller has them.
    #[serde(default)]
    pub table_stats: BTreeMap<String, TableStats>,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Annotates operation sets with risk, impact, and recommendations.
/// Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaDiffAnalyzer;

impl SchemaDiffAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyzes an operation set against the given context.
    pub fn analyze(
        &self,
        operations: &[MigrationOperation],
        context: &AnalyzerContext,
    ) -> MigrationAnalysis {
        let mut risk = RiskLevel::Low;
        let mut impact = PerformanceImpact::None;
        let mut minutes = 0.0;
        let mut requires_downtime = false;
        let mut recommendations = Vec::new();
        let mut warnings = Vec::new();
        let mut rollback_plan = Vec::new();
        let mut statistics = OperationStatistics::default();

        for op in operations {
            let verdict = self.analyze_operation(op, context);
            risk = risk.max(verdict.risk);
            impact = impact.max(verdict.impact);
            minutes += verdict.minutes.max(MIN_OP_MINUTES);
            requires_downtime |= verdict.requires_downtime;
            recommendations.extend(verdict.recommendations);
            warnings.extend(verdict.warnings);
            rollback_plan.push(verdict.rollback);

            statistics.total += 1;
            if op.is_destructive() {
                statistics.destructive += 1;
            }
            *statistics
                .by_kind
                .entry(op.kind.as_str().to_owned())
                .or_insert(0) += 1;
        }

        self.add_aggregate_recommendations(
            &mut recommendations,
            risk,
            impact,
            minutes,
            statistics.destructive,
            context,
        );

        // Highest-priority advice first; stable within a bucket.
        recommendations.sort_by_key(|r| Reverse(r.priority));

        MigrationAnalysis {
            risk_level: risk,
            performance_impact: impact,
            estimated_duration_minutes: minutes,
            recommendations,
            warnings,
            statistics,
            requires_downtime,
            rollback_plan,
        }
    }

    fn analyze_operation(
        &self,
        op: &MigrationOperation,
        context: &AnalyzerContext,
    ) -> OperationVerdict {
        let tokens = tokens_upper(&op.sql);
        let mut verdict = OperationVerdict::new(rollback_entry(op));

        if op.is_destructive() {
            verdict.risk = RiskLevel::Critical;
            verdict.impact = verdict.impact.max(PerformanceImpact::Low);
            verdict.minutes = verdict.minutes.max(1.0);
            verdict.recommend(
                RecommendationKind::Backup,
                RiskLevel::High,
                format!("Back up {} before running this destructive change", op.object_name),
                Some(op.object_name.clone()),
            );
            verdict.warn(
                WarningKind::DataLoss,
                WarningSeverity::Critical,
                format!("{} permanently discards schema or data", op.sql.trim()),
            );
        }

        if has_phrase(&tokens, &["ALTER", "COLUMN"]) && token_after_phrase(&tokens, &["ALTER", "COLUMN"], "TYPE") {
            verdict.risk = verdict.risk.max(RiskLevel::High);
            verdict.impact = verdict.impact.max(PerformanceImpact::High);
            verdict.minutes = verdict.minutes.max(5.0);
            verdict.recommend(
                RecommendationKind::TypeSafety,
                RiskLevel::Medium,
                format!(
                    "Verify every value in {} converts cleanly to the new type",
                    op.object_name
                ),
                Some(op.object_name.clone()),
            );
            verdict.warn(
                WarningKind::TypeConversion,
                WarningSeverity::Warning,
                "Column type changes rewrite the table and can fail on unconvertible values"
                    .to_owned(),
            );
        }

        if is_create_index(&tokens) {
            let concurrent = tokens.iter().any(|t| t == "CONCURRENTLY");
            verdict.risk = verdict.risk.max(RiskLevel::Medium);
            verdict.impact = verdict.impact.max(if concurrent {
                PerformanceImpact::Medium
            } else {
                PerformanceImpact::High
            });
            verdict.minutes = verdict
                .minutes
                .max(index_minutes(&op.sql, concurrent, context));

            if !concurrent && context.is_prod {
                verdict.requires_downtime = true;
                verdict.recommend(
                    RecommendationKind::ConcurrentIndex,
                    RiskLevel::High,
                    format!(
                        "Create {} CONCURRENTLY to avoid blocking writes in production",
                        op.object_name
                    ),
                    Some(op.object_name.clone()),
                );
            }
            verdict.warn(
                WarningKind::IndexCreation,
                WarningSeverity::Info,
                format!("Index build on {} holds resources while it runs", op.object_name),
            );
        }

        if has_phrase(&tokens, &["ALTER", "COLUMN"]) && has_phrase(&tokens, &["SET", "NOT", "NULL"])
        {
            verdict.risk = verdict.risk.max(RiskLevel::Medium);
            verdict.impact = verdict.impact.max(PerformanceImpact::Medium);
            verdict.minutes = verdict.minutes.max(2.0);
            verdict.recommend(
                RecommendationKind::NullCheck,
                RiskLevel::High,
                format!(
                    "Check {} for NULLs before adding the constraint",
                    op.object_name
                ),
                Some(op.object_name.clone()),
            );
            verdict.warn(
                WarningKind::ConstraintFailure,
                WarningSeverity::Warning,
                "SET NOT NULL scans the table and fails on existing NULLs".to_owned(),
            );
        }

        let drops_policy = has_phrase(&tokens, &["DROP", "POLICY"]);
        if drops_policy
            || has_phrase(&tokens, &["CREATE", "POLICY"])
            || has_phrase(&tokens, &["ALTER", "POLICY"])
        {
            if drops_policy {
                verdict.risk = verdict.risk.max(RiskLevel::High);
                verdict.warn(
                    WarningKind::Security,
                    WarningSeverity::High,
                    format!("Dropping a policy on {} widens row access", op.object_name),
                );
            } else {
                verdict.risk = verdict.risk.max(RiskLevel::Medium);
            }
            verdict.recommend(
                RecommendationKind::RlsTesting,
                RiskLevel::Medium,
                "Re-test row-level security rules for every affected role".to_owned(),
                Some(op.object_name.clone()),
            );
        }

        if has_phrase(&tokens, &["CREATE", "OR", "REPLACE", "FUNCTION"]) {
            verdict.recommend(
                RecommendationKind::FunctionTesting,
                RiskLevel::Medium,
                format!("Exercise {} after replacement; signatures stay, behavior may not", op.object_name),
                Some(op.object_name.clone()),
            );
        }

        verdict
    }

    fn add_aggregate_recommendations(
        &self,
        recommendations: &mut Vec<Recommendation>,
        risk: RiskLevel,
        impact: PerformanceImpact,
        minutes: f64,
        destructive_count: usize,
        context: &AnalyzerContext,
    ) {
        let mut plan_wide = |kind, priority, message: &str| {
            recommendations.push(Recommendation {
                kind,
                priority,
                message: message.to_owned(),
                operation: None,
            });
        };

        if impact == PerformanceImpact::High {
            plan_wide(
                RecommendationKind::MaintenanceWindow,
                RiskLevel::High,
                "Run this migration inside a maintenance window",
            );
        }
        if minutes > MONITORING_THRESHOLD_MINUTES {
            plan_wide(
                RecommendationKind::Monitoring,
                RiskLevel::Medium,
                "Watch database load for the duration of this long-running migration",
            );
        }
        if context.is_prod && risk > RiskLevel::Low {
            plan_wide(
                RecommendationKind::StagingTest,
                RiskLevel::High,
                "Run the full migration against staging first",
            );
            plan_wide(
                RecommendationKind::RollbackPlan,
                RiskLevel::High,
                "Prepare and rehearse the rollback plan before deploying",
            );
        }
        if destructive_count > 1 {
            plan_wide(
                RecommendationKind::PhasedDeployment,
                RiskLevel::High,
                "Split the destructive changes across separate deployments",
            );
        }
        if risk == RiskLevel::Critical {
            plan_wide(
                RecommendationKind::BlueGreenDeployment,
                RiskLevel::High,
                "Consider a blue-green deployment so the previous schema stays live",
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Per-operation verdict accumulator
// ---------------------------------------------------------------------------

struct OperationVerdict {
    risk: RiskLevel,
    impact: PerformanceImpact,
    minutes: f64,
    requires_downtime: bool,
    recommendations: Vec<Recommendation>,
    warnings: Vec<AnalysisWarning>,
    rollback: RollbackEntry,
}

impl OperationVerdict {
    fn new(rollback: RollbackEntry) -> Self {
        Self {
            risk: RiskLevel::Low,
            impact: PerformanceImpact::None,
            minutes: 0.5,
            requires_downtime: false,
            recommendations: Vec::new(),
            warnings: Vec::new(),
            rollback,
        }
    }

    fn recommend(
        &mut self,
        kind: RecommendationKind,
        priority: RiskLevel,
        message: String,
        operation: Option<String>,
    ) {
        self.recommendations.push(Recommendation {
            kind,
            priority,
            message,
            operation,
        });
    }

    fn warn(&mut self, kind: WarningKind, severity: WarningSeverity, message: String) {
        self.warnings.push(AnalysisWarning {
            kind,
            message,
            severity,
        });
    }
}

/// Rollback outline entry: creates invert automatically, everything else
/// needs a human.
fn rollback_entry(op: &MigrationOperation) -> RollbackEntry {
    match op.kind {
        OperationKind::CreateTable => auto_drop("TABLE", &op.object_name),
        OperationKind::CreateIndex => auto_drop("INDEX", &op.object_name),
        OperationKind::CreateFunction => auto_drop("FUNCTION", &op.object_name),
        OperationKind::CreateView => auto_drop("VIEW", &op.object_name),
        OperationKind::AlterTable => RollbackEntry {
            description: format!("Review and manually revert changes to {}", op.object_name),
            manual: true,
        },
        OperationKind::InsertData | OperationKind::UpdateData => RollbackEntry {
            description: format!("Manually revert data changes to {}", op.object_name),
            manual: true,
        },
        _ => RollbackEntry {
            description: format!("Manually restore {} from backup", op.object_name),
            manual: true,
        },
    }
}

fn auto_drop(keyword: &str, name: &str) -> RollbackEntry {
    RollbackEntry {
        description: format!("DROP {keyword} IF EXISTS {name}"),
        manual: false,
    }
}

// ---------------------------------------------------------------------------
// SQL token helpers
// ---------------------------------------------------------------------------

fn tokens_upper(sql: &str) -> Vec<String> {
    sql.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_uppercase())
        .collect()
}

/// Contiguous token subsequence match.
fn has_phrase(tokens: &[String], phrase: &[&str]) -> bool {
    phrase_position(tokens, phrase).is_some()
}

fn phrase_position(tokens: &[String], phrase: &[&str]) -> Option<usize> {
    if phrase.is_empty() || tokens.len() < phrase.len() {
        return None;
    }
    (0..=tokens.len() - phrase.len())
        .find(|&i| phrase.iter().zip(&tokens[i..]).all(|(p, t)| t == p))
}

/// Whether `token` appears somewhere after the first match of `phrase`.
fn token_after_phrase(tokens: &[String], phrase: &[&str], token: &str) -> bool {
    match phrase_position(tokens, phrase) {
        Some(i) => tokens[i + phrase.len()..].iter().any(|t| t == token),
        None => false,
    }
}

/// `CREATE [UNIQUE] INDEX` with at most one modifier between the keywords.
fn is_create_index(tokens: &[String]) -> bool {
    tokens.iter().enumerate().any(|(i, t)| {
        t == "CREATE"
            && tokens[i + 1..]
                .iter()
                .take(2)
                .any(|next| next == "INDEX")
    })
}

/// The table an index is built on: the token following `ON`.
fn index_table(sql: &str) -> Option<String> {
    let tokens: Vec<&str> = sql
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .collect();
    tokens
        .iter()
        .position(|t| t.eq_ignore_ascii_case("on"))
        .and_then(|i| tokens.get(i + 1))
        .map(|t| (*t).to_owned())
}

/// Base index-build estimate, scaled logarithmically for large tables.
fn index_minutes(sql: &str, concurrent: bool, context: &AnalyzerContext) -> f64 {
    let base = if concurrent { 5.0 } else { 2.0 };
    let rows = index_table(sql)
        .and_then(|table| context.table_stats.get(&table))
        .map(|stats| stats.rows)
        .unwrap_or(0);
    if rows > LARGE_TABLE_ROWS {
        base * ((rows as f64 / LARGE_TABLE_ROWS as f64).log10() + 1.0)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::operation::OperationDetail;

    fn op(kind: OperationKind, name: &str, sql: &str) -> MigrationOperation {
        MigrationOperation::new(kind, name, sql, OperationDetail::Data)
    }

    fn analyze(ops: &[MigrationOperation], context: &AnalyzerContext) -> MigrationAnalysis {
        SchemaDiffAnalyzer::new().analyze(ops, context)
    }

    fn has_rec(analysis: &MigrationAnalysis, kind: RecommendationKind) -> bool {
        analysis.recommendations.iter().any(|r| r.kind == kind)
    }

    #[test]
    fn empty_set_is_low_risk() {
        let analysis = analyze(&[], &AnalyzerContext::default());
        assert_eq!(analysis.risk_level, RiskLevel::Low);
        assert_eq!(analysis.performance_impact, PerformanceImpact::None);
        assert_eq!(analysis.estimated_duration_minutes, 0.0);
        assert!(analysis.recommendations.is_empty());
        assert!(!analysis.requires_downtime);
    }

    #[test]
    fn destructive_operation_is_critical_with_backup() {
        let ops = vec![op(
            OperationKind::DropTable,
            "users",
            "DROP TABLE IF EXISTS users",
        )];
        let analysis = analyze(&ops, &AnalyzerContext::default());

        assert_eq!(analysis.risk_level, RiskLevel::Critical);
        assert!(has_rec(&analysis, RecommendationKind::Backup));
        assert!(analysis
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::DataLoss
                && w.severity == WarningSeverity::Critical));
        assert_eq!(analysis.rollback_plan.len(), 1);
        assert!(analysis.rollback_plan[0].manual);
        // Critical risk adds the blue-green aggregate.
        assert!(has_rec(&analysis, RecommendationKind::BlueGreenDeployment));
    }

    #[test]
    fn column_type_change_flags_conversion() {
        let ops = vec![op(
            OperationKind::AlterTable,
            "users",
            "ALTER TABLE users ALTER COLUMN age TYPE BIGINT",
        )];
        let analysis = analyze(&ops, &AnalyzerContext::default());

        assert_eq!(analysis.risk_level, RiskLevel::High);
        assert_eq!(analysis.performance_impact, PerformanceImpact::High);
        assert!(has_rec(&analysis, RecommendationKind::TypeSafety));
        assert!(analysis
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::TypeConversion));
    }

    #[test]
    fn production_index_without_concurrently_needs_downtime() {
        let ops = vec![op(
            OperationKind::CreateIndex,
            "users_email_idx",
            "CREATE INDEX users_email_idx ON users (email)",
        )];
        let context = AnalyzerContext {
            is_prod: true,
            ..AnalyzerContext::default()
        };
        let analysis = analyze(&ops, &context);

        assert_eq!(analysis.performance_impact, PerformanceImpact::High);
        assert!(analysis.requires_downtime);
        let rec = analysis
            .recommendations
            .iter()
            .find(|r| r.kind == RecommendationKind::ConcurrentIndex)
            .expect("concurrent index recommendation");
        assert_eq!(rec.priority, RiskLevel::High);
        assert!(analysis
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::IndexCreation
                && w.severity == WarningSeverity::Info));
    }

    #[test]
    fn concurrent_index_avoids_downtime() {
        let ops = vec![op(
            OperationKind::CreateIndex,
            "users_email_idx",
            "CREATE INDEX CONCURRENTLY users_email_idx ON users (email)",
        )];
        let context = AnalyzerContext {
            is_prod: true,
            ..AnalyzerContext::default()
        };
        let analysis = analyze(&ops, &context);

        assert!(!analysis.requires_downtime);
        assert!(!has_rec(&analysis, RecommendationKind::ConcurrentIndex));
        assert_eq!(analysis.performance_impact, PerformanceImpact::Medium);
        // INDEX_CREATION info warning still applies.
        assert!(analysis
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::IndexCreation));
    }

    #[test]
    fn large_table_scales_index_duration() {
        let sql = "CREATE INDEX users_email_idx ON users (email)";
        let mut context = AnalyzerContext::default();
        context
            .table_stats
            .insert("users".into(), TableStats { rows: 10_000_000 });

        // 10M rows: 2 min * (log10(100) + 1) = 6 min.
        let minutes = index_minutes(sql, false, &context);
        assert!((minutes - 6.0).abs() < 1e-9);

        // Below the threshold the base applies unchanged.
        context
            .table_stats
            .insert("users".into(), TableStats { rows: 50_000 });
        assert_eq!(index_minutes(sql, false, &context), 2.0);
    }

    #[test]
    fn set_not_null_flags_constraint_failure() {
        let ops = vec![op(
            OperationKind::AlterTable,
            "users",
            "ALTER TABLE users ALTER COLUMN email SET NOT NULL",
        )];
        let analysis = analyze(&ops, &AnalyzerContext::default());

        assert!(has_rec(&analysis, RecommendationKind::NullCheck));
        assert!(analysis
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::ConstraintFailure));
    }

    #[test]
    fn policy_changes_demand_rls_testing() {
        let create = vec![op(
            OperationKind::AlterTable,
            "users",
            "CREATE POLICY tenant_isolation ON users USING (tenant_id = current_tenant())",
        )];
        let analysis = analyze(&create, &AnalyzerContext::default());
        assert!(has_rec(&analysis, RecommendationKind::RlsTesting));
        assert!(analysis.warnings.iter().all(|w| w.kind != WarningKind::Security));

        let drop = vec![op(
            OperationKind::AlterTable,
            "users",
            "DROP POLICY tenant_isolation ON users",
        )];
        let analysis = analyze(&drop, &AnalyzerContext::default());
        assert_eq!(analysis.risk_level, RiskLevel::High);
        assert!(analysis
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::Security && w.severity == WarningSeverity::High));
    }

    #[test]
    fn replaced_function_gets_testing_recommendation() {
        let ops = vec![op(
            OperationKind::CreateFunction,
            "update_timestamp",
            "CREATE OR REPLACE FUNCTION update_timestamp() RETURNS trigger AS $$ ... $$",
        )];
        let analysis = analyze(&ops, &AnalyzerContext::default());
        assert!(has_rec(&analysis, RecommendationKind::FunctionTesting));
    }

    #[test]
    fn production_index_plus_destructive_op_escalates() {
        // Scenario S8: non-concurrent index in production plus a drop.
        let ops = vec![
            op(
                OperationKind::CreateIndex,
                "users_email_idx",
                "CREATE INDEX users_email_idx ON users (email)",
            ),
            op(OperationKind::DropView, "old_view", "DROP VIEW IF EXISTS old_view"),
        ];
        let context = AnalyzerContext {
            is_prod: true,
            ..AnalyzerContext::default()
        };
        let analysis = analyze(&ops, &context);

        assert_eq!(analysis.risk_level, RiskLevel::Critical);
        assert_eq!(analysis.performance_impact, PerformanceImpact::High);
        assert!(analysis.requires_downtime);
        assert!(has_rec(&analysis, RecommendationKind::ConcurrentIndex));
        assert!(has_rec(&analysis, RecommendationKind::Backup));
        // Production + elevated risk adds staging and rollback advice.
        assert!(has_rec(&analysis, RecommendationKind::StagingTest));
        assert!(has_rec(&analysis, RecommendationKind::RollbackPlan));
        assert_eq!(analysis.statistics.total, 2);
        assert_eq!(analysis.statistics.destructive, 1);
        assert_eq!(analysis.statistics.by_kind["create_index"], 1);
    }

    #[test]
    fn recommendations_sorted_by_priority_descending() {
        let ops = vec![
            op(
                OperationKind::CreateFunction,
                "f",
                "CREATE OR REPLACE FUNCTION f() RETURNS void AS $$ $$",
            ),
            op(OperationKind::DropTable, "t", "DROP TABLE IF EXISTS t"),
        ];
        let analysis = analyze(&ops, &AnalyzerContext::default());

        for pair in analysis.recommendations.windows(2) {
            assert!(pair[0].priority >= pair[1].priority);
        }
    }

    #[test]
    fn multiple_destructive_ops_suggest_phasing() {
        let ops = vec![
            op(OperationKind::DropTable, "a", "DROP TABLE IF EXISTS a"),
            op(OperationKind::DropTable, "b", "DROP TABLE IF EXISTS b"),
        ];
        let analysis = analyze(&ops, &AnalyzerContext::default());
        assert!(has_rec(&analysis, RecommendationKind::PhasedDeployment));
    }

    #[test]
    fn long_migrations_get_monitoring_advice() {
        // Seven 5-minute type rewrites push the total past the threshold.
        let ops: Vec<MigrationOperation> = (0..7)
            .map(|i| {
                op(
                    OperationKind::AlterTable,
                    "users",
                    &format!("ALTER TABLE users ALTER COLUMN c{i} TYPE BIGINT"),
                )
            })
            .collect();
        let analysis = analyze(&ops, &AnalyzerContext::default());
        assert!(analysis.estimated_duration_minutes > MONITORING_THRESHOLD_MINUTES);
        assert!(has_rec(&analysis, RecommendationKind::Monitoring));
    }

    #[test]
    fn creates_invert_automatically_in_rollback_outline() {
        let ops = vec![
            op(OperationKind::CreateTable, "users", "CREATE TABLE users"),
            op(OperationKind::DeleteData, "users", "DELETE FROM users"),
        ];
        let analysis = analyze(&ops, &AnalyzerContext::default());
        assert_eq!(analysis.rollback_plan.len(), 2);
        assert!(!analysis.rollback_plan[0].manual);
        assert_eq!(
            analysis.rollback_plan[0].description,
            "DROP TABLE IF EXISTS users"
        );
        assert!(analysis.rollback_plan[1].manual);
    }
}
