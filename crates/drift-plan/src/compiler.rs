//! Plan compiler -- turns an operation set into a phased, dependency-linked
//! execution plan with rollback metadata.

use serde::{Deserialize, Serialize};
use tracing::debug;

use drift_core::enums::OperationKind;
use drift_core::operation::MigrationOperation;

use crate::plan::{ExecutionPlan, PlanMetadata};
use crate::plan_id::derive_plan_id;
use crate::step::{ExecutionPhase, ExecutionStep};

/// One-hour threshold above which a plan draws a duration warning.
const LONG_PLAN_MS: u64 = 3_600_000;

// ---------------------------------------------------------------------------
// Options / validation report
// ---------------------------------------------------------------------------

/// Options for [`PlanCompiler::compile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Overrides the derived plan id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,

    /// Overrides the default plan name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,

    pub enable_rollback: bool,

    pub parallel_execution: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            plan_id: None,
            plan_name: None,
            enable_rollback: true,
            parallel_execution: false,
        }
    }
}

/// Structured result of [`PlanCompiler::validate_plan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub estimated_ms: u64,
    pub step_count: usize,
}

// ---------------------------------------------------------------------------
// PlanCompiler
// ---------------------------------------------------------------------------

/// Compiles operation sets into execution plans. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanCompiler;

impl PlanCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compiles `operations` into a phased execution plan.
    ///
    /// Never fails; structural problems are reported by
    /// [`validate_plan`](Self::validate_plan).
    pub fn compile(
        &self,
        operations: &[MigrationOperation],
        options: &CompileOptions,
    ) -> ExecutionPlan {
        let id = options
            .plan_id
            .clone()
            .unwrap_or_else(|| derive_plan_id(operations));
        let name = options
            .plan_name
            .clone()
            .unwrap_or_else(|| "Migration plan".to_owned());

        debug!(
            plan_id = %id,
            operation_count = operations.len(),
            "compiling execution plan"
        );

        let mut plan = ExecutionPlan::new(id, name);
        plan.metadata = PlanMetadata {
            created_at: None,
            operation_count: operations.len(),
            rollback_enabled: options.enable_rollback,
            parallel_execution: options.parallel_execution,
        };

        for op in operations {
            plan.add_step(self.build_step(op, options));
        }

        // The validation checkpoint is always present, even for empty plans.
        let mut validation =
            ExecutionStep::new("step_validation", "Validate migration results", ExecutionPhase::Validation);
        validation.options.can_rollback = false;
        validation.options.continue_on_error = true;
        plan.add_step(validation);

        self.link_phases(&mut plan);
        plan.compiled = true;
        plan
    }

    /// Validates a compiled plan.
    ///
    /// Errors make the plan unexecutable (not compiled, circular
    /// dependencies); warnings flag empty or unusually long plans.
    pub fn validate_plan(&self, plan: &ExecutionPlan) -> PlanValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if !plan.compiled {
            errors.push("plan has not been compiled".to_owned());
        }
        if plan.has_cycles() {
            errors.push("plan contains circular dependencies".to_owned());
        }
        if plan.steps.is_empty() {
            warnings.push("plan contains no steps".to_owned());
        }

        let estimated_ms = plan.total_estimated_ms();
        if estimated_ms > LONG_PLAN_MS {
            warnings.push(format!(
                "estimated duration {}s exceeds one hour",
                estimated_ms / 1000
            ));
        }

        PlanValidation {
            valid: errors.is_empty(),
            errors,
            warnings,
            estimated_ms,
            step_count: plan.steps.len(),
        }
    }

    fn build_step(&self, op: &MigrationOperation, options: &CompileOptions) -> ExecutionStep {
        let phase = phase_for(op.kind);
        let mut step = ExecutionStep::new(
            format!("step_{}_{}", op.object_name, op.kind.ordinal()),
            format!("{} {}", op.kind.verb(), op.object_name),
            phase,
        );
        step.sql.push(op.sql.clone());
        step.options.can_rollback = options.enable_rollback && !op.is_destructive();
        step.options.timeout_ms = op.kind.timeout_ms();
        if step.options.can_rollback {
            step.rollback_sql = rollback_sql_for(op);
        }
        step.estimated_ms = step.sql.iter().map(|s| estimate_sql_ms(s)).sum();
        step
    }

    /// Wires the phase barriers: every step of a later non-empty phase
    /// depends on every step of the immediately preceding non-empty phase.
    /// Intra-phase ordering stays unconstrained.
    fn link_phases(&self, plan: &mut ExecutionPlan) {
        let groups: Vec<Vec<usize>> = ExecutionPhase::ALL
            .iter()
            .filter_map(|phase| plan.phases.get(phase))
            .filter(|indices| !indices.is_empty())
            .cloned()
            .collect();

        for pair in groups.windows(2) {
            for &step in &pair[1] {
                for &dep in &pair[0] {
                    // Indices come from the plan's own phase table.
                    let _ = plan.add_dependency(step, dep);
                }
            }
        }
    }
}

/// Phase assignment: destructive operations drop first, schema operations
/// create next, data manipulation runs last.
fn phase_for(kind: OperationKind) -> ExecutionPhase {
    if kind.is_destructive() {
        ExecutionPhase::SchemaDrop
    } else if kind.is_schema() {
        ExecutionPhase::SchemaCreate
    } else {
        ExecutionPhase::DataMigration
    }
}

/// Inverse statements for reversible creates; everything else has no
/// automatic rollback.
fn rollback_sql_for(op: &MigrationOperation) -> Vec<String> {
    let keyword = match op.kind {
        OperationKind::CreateTable => "TABLE",
        OperationKind::CreateIndex => "INDEX",
        OperationKind::CreateFunction => "FUNCTION",
        OperationKind::CreateView => "VIEW",
        _ => return Vec::new(),
    };
    vec![format!("DROP {} IF EXISTS {}", keyword, op.object_name)]
}

/// Heuristic duration estimate for one statement:
/// `1000 + 500 per DML/DDL keyword + 200 per table reference` milliseconds.
///
/// A table reference is FROM/JOIN/INTO/TABLE followed by an identifier
/// token. Token scan only; no SQL parsing.
fn estimate_sql_ms(sql: &str) -> u64 {
    let tokens: Vec<&str> = sql
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .collect();

    let mut keywords = 0u64;
    let mut table_refs = 0u64;
    for (i, token) in tokens.iter().enumerate() {
        let upper = token.to_ascii_uppercase();
        match upper.as_str() {
            "CREATE" | "ALTER" | "DROP" | "INSERT" | "UPDATE" | "DELETE" => keywords += 1,
            "FROM" | "JOIN" | "INTO" | "TABLE" => {
                if tokens.get(i + 1).is_some_and(|next| is_identifier(next)) {
                    table_refs += 1;
                }
            }
            _ => {}
        }
    }

    1000 + 500 * keywords + 200 * table_refs
}

fn is_identifier(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}
