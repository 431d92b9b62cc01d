//! The [`Planner`] -- one planning cycle from snapshots to annotated plan.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use drift_analyze::analyzer::{AnalyzerContext, SchemaDiffAnalyzer};
use drift_analyze::report::MigrationAnalysis;
use drift_core::diff::DiffEngine;
use drift_core::operation::MigrationOperation;
use drift_core::ports::{ClockPort, CryptoPort, PortError, iso_millis};
use drift_core::schema::SchemaState;
use drift_meta::error::MetadataError;
use drift_meta::lifecycle;
use drift_meta::patch::{GenerationPatch, MetadataPatch};
use drift_meta::record::MigrationMetadata;
use drift_plan::compiler::{CompileOptions, PlanCompiler};
use drift_plan::plan::ExecutionPlan;

/// Errors a planning cycle can surface.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Convenience alias for planner operations.
pub type Result<T> = std::result::Result<T, PlannerError>;

/// Input for one planning cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub migration_id: String,
    pub migration_name: String,

    /// How many SQL source files produced the target snapshot.
    pub source_files_compiled: usize,

    pub compile: CompileOptions,
    pub context: AnalyzerContext,
}

impl PlanRequest {
    pub fn new(migration_id: impl Into<String>, migration_name: impl Into<String>) -> Self {
        Self {
            migration_id: migration_id.into(),
            migration_name: migration_name.into(),
            source_files_compiled: 0,
            compile: CompileOptions::default(),
            context: AnalyzerContext::default(),
        }
    }
}

/// Everything one planning cycle produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningOutcome {
    pub operations: Vec<MigrationOperation>,
    pub plan: ExecutionPlan,
    pub analysis: MigrationAnalysis,
    pub metadata: MigrationMetadata,
}

/// Coordinates diff -> compile -> analyze -> metadata for one migration.
///
/// Owns the two ports the core needs; everything else is passed per call.
pub struct Planner<C, K> {
    diff: DiffEngine<C>,
    compiler: PlanCompiler,
    analyzer: SchemaDiffAnalyzer,
    clock: K,
}

impl<C: CryptoPort, K: ClockPort> Planner<C, K> {
    pub fn new(crypto: C, clock: K) -> Self {
        Self {
            diff: DiffEngine::new(crypto),
            compiler: PlanCompiler::new(),
            analyzer: SchemaDiffAnalyzer::new(),
            clock,
        }
    }

    /// Runs one full planning cycle.
    ///
    /// The returned metadata is a fresh pending record whose generation
    /// section describes this cycle.
    pub fn plan(
        &self,
        current: &SchemaState,
        target: &SchemaState,
        request: &PlanRequest,
    ) -> Result<PlanningOutcome> {
        let started = Instant::now();
        debug!(
            migration_id = %request.migration_id,
            current_objects = current.len(),
            target_objects = target.len(),
            "starting planning cycle"
        );

        let operations = self.diff.calculate_diff(current, target)?;
        let operations = self.diff.optimize(operations);
        let has_differences = !operations.is_empty();

        let mut plan = self.compiler.compile(&operations, &request.compile);
        plan.metadata.created_at = Some(self.clock.now());

        let analysis = self.analyzer.analyze(&operations, &request.context);

        let metadata = lifecycle::create_default(
            &request.migration_id,
            &request.migration_name,
            &self.clock,
        )?;
        let generation = MetadataPatch {
            generation: Some(GenerationPatch {
                generated_at: Some(iso_millis(&self.clock.now())),
                has_differences: Some(has_differences),
                statement_count: Some(operations.len()),
                source_files_compiled: Some(request.source_files_compiled),
                generation_time_ms: Some(started.elapsed().as_millis() as u64),
            }),
            ..MetadataPatch::default()
        };
        let metadata = lifecycle::update(&metadata, &generation)?;

        info!(
            migration_id = %request.migration_id,
            operations = operations.len(),
            risk = %analysis.risk_level,
            "planning cycle complete"
        );

        Ok(PlanningOutcome {
            operations,
            plan,
            analysis,
            metadata,
        })
    }

    /// Records a test run against a planned migration.
    pub fn attest_tests(
        &self,
        metadata: &MigrationMetadata,
        passed: i64,
        failed: i64,
    ) -> Result<MigrationMetadata> {
        Ok(lifecycle::update_test_results(
            metadata,
            passed,
            failed,
            &self.clock,
        )?)
    }

    /// Promotes a tested migration.
    pub fn promote(
        &self,
        metadata: &MigrationMetadata,
        promoted_by: &str,
    ) -> Result<MigrationMetadata> {
        Ok(lifecycle::update_promotion(
            metadata,
            promoted_by,
            &self.clock,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use drift_core::enums::{OperationKind, SchemaObjectCategory};
    use drift_core::ports::{FixedClock, Sha256Crypto};
    use drift_core::schema::SchemaObject;
    use drift_meta::record::MigrationStatus;
    use serde_json::json;

    fn planner() -> Planner<Sha256Crypto, FixedClock> {
        let clock = FixedClock(chrono::Utc.with_ymd_and_hms(2025, 8, 28, 12, 0, 0).unwrap());
        Planner::new(Sha256Crypto, clock)
    }

    fn target_with_users() -> SchemaState {
        let mut state = SchemaState::new();
        state.add_object(
            SchemaObjectCategory::Table,
            SchemaObject::new(
                "users",
                json!({"sql": "CREATE TABLE users (id SERIAL PRIMARY KEY)"}),
            ),
        );
        state
    }

    #[test]
    fn full_planning_cycle() {
        let outcome = planner()
            .plan(
                &SchemaState::new(),
                &target_with_users(),
                &PlanRequest::new("20250828_1", "add_users"),
            )
            .unwrap();

        assert_eq!(outcome.operations.len(), 1);
        assert_eq!(outcome.operations[0].kind, OperationKind::CreateTable);

        assert!(outcome.plan.compiled);
        assert!(!outcome.plan.has_cycles());
        assert!(outcome.plan.metadata.created_at.is_some());
        // Create step plus the validation checkpoint.
        assert_eq!(outcome.plan.steps.len(), 2);

        assert_eq!(outcome.analysis.statistics.total, 1);

        assert_eq!(outcome.metadata.status, MigrationStatus::Pending);
        let generation = outcome.metadata.generation.as_ref().unwrap();
        assert!(generation.has_differences);
        assert_eq!(generation.statement_count, 1);
        assert_eq!(generation.generated_at, "2025-08-28T12:00:00.000Z");
    }

    #[test]
    fn identical_snapshots_plan_no_changes() {
        let state = target_with_users();
        let outcome = planner()
            .plan(&state, &state.clone(), &PlanRequest::new("m1", "noop"))
            .unwrap();

        assert!(outcome.operations.is_empty());
        let generation = outcome.metadata.generation.as_ref().unwrap();
        assert!(!generation.has_differences);
        assert_eq!(generation.statement_count, 0);
        // Only the validation checkpoint remains.
        assert_eq!(outcome.plan.steps.len(), 1);
    }

    #[test]
    fn lifecycle_helpers_drive_metadata_forward() {
        let p = planner();
        let outcome = p
            .plan(
                &SchemaState::new(),
                &target_with_users(),
                &PlanRequest::new("m1", "add_users"),
            )
            .unwrap();

        let tested = p.attest_tests(&outcome.metadata, 5, 0).unwrap();
        assert_eq!(tested.status, MigrationStatus::Tested);

        let promoted = p.promote(&tested, "alice").unwrap();
        assert_eq!(promoted.status, MigrationStatus::Promoted);

        // Promotion from pending stays illegal through the coordinator too.
        let err = p.promote(&outcome.metadata, "alice").unwrap_err();
        assert!(matches!(err, PlannerError::Metadata(e) if e.is_invalid_transition()));
    }

    #[test]
    fn request_options_reach_the_compiler() {
        let request = PlanRequest {
            compile: CompileOptions {
                plan_id: Some("plan-custom".into()),
                plan_name: Some("custom plan".into()),
                ..CompileOptions::default()
            },
            ..PlanRequest::new("m1", "add_users")
        };
        let outcome = planner()
            .plan(&SchemaState::new(), &target_with_users(), &request)
            .unwrap();

        assert_eq!(outcome.plan.id, "plan-custom");
        assert_eq!(outcome.plan.name, "custom plan");
    }
}
