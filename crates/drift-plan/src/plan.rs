//! Execution plans -- dependency-aware step graphs with phase grouping.
//!
//! Steps live in an arena (`Vec<ExecutionStep>`) and reference each other by
//! index, which keeps the dependency graph serializable and makes cycle
//! detection a plain DFS.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::step::{ExecutionPhase, ExecutionStep};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Structural misuse of a plan.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// A dependency referenced a step index outside the arena.
    #[error("unknown step index {index} (plan has {step_count} steps)")]
    UnknownStep { index: usize, step_count: usize },

    /// A step attempted to depend on itself.
    #[error("step {id} cannot depend on itself")]
    SelfDependency { id: String },
}

/// Convenience alias for plan operations.
pub type Result<T> = std::result::Result<T, PlanError>;

// ---------------------------------------------------------------------------
// Plan metadata
// ---------------------------------------------------------------------------

/// Typed metadata attached to a compiled plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    /// Stamped by the coordinator; the compiler itself has no clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub operation_count: usize,

    #[serde(default)]
    pub rollback_enabled: bool,

    #[serde(default)]
    pub parallel_execution: bool,
}

// ---------------------------------------------------------------------------
// ExecutionPlan
// ---------------------------------------------------------------------------

/// A phased, dependency-linked sequence of execution steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: String,
    pub name: String,

    /// Step arena; dependencies are indices into this vector.
    pub steps: Vec<ExecutionStep>,

    /// Phase -> ordered step indices.
    pub phases: BTreeMap<ExecutionPhase, Vec<usize>>,

    pub metadata: PlanMetadata,

    /// Set by the compiler once the dependency graph is wired.
    pub compiled: bool,
}

impl ExecutionPlan {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a step to the arena and its phase group; returns its index.
    pub fn add_step(&mut self, step: ExecutionStep) -> usize {
        let index = self.steps.len();
        self.phases.entry(step.phase).or_default().push(index);
        self.steps.push(step);
        index
    }

    /// Declares that `step` must run after `depends_on`.
    pub fn add_dependency(&mut self, step: usize, depends_on: usize) -> Result<()> {
        let step_count = self.steps.len();
        if step >= step_count {
            return Err(PlanError::UnknownStep {
                index: step,
                step_count,
            });
        }
        if depends_on >= step_count {
            return Err(PlanError::UnknownStep {
                index: depends_on,
                step_count,
            });
        }
        if step == depends_on {
            return Err(PlanError::SelfDependency {
                id: self.steps[step].id.clone(),
            });
        }
        self.steps[step].dependencies.insert(depends_on);
        Ok(())
    }

    pub fn step(&self, index: usize) -> Option<&ExecutionStep> {
        self.steps.get(index)
    }

    /// Sum of per-step duration estimates.
    pub fn total_estimated_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.estimated_ms).sum()
    }

    /// A step is ready when every dependency has executed.
    pub fn is_ready(&self, index: usize) -> bool {
        match self.steps.get(index) {
            Some(step) => step
                .dependencies
                .iter()
                .all(|&dep| self.steps.get(dep).is_some_and(|d| d.executed)),
            None => false,
        }
    }

    /// Returns `true` if the dependency graph contains a cycle.
    ///
    /// Classic 3-color DFS: a back-edge to a node currently on the stack is
    /// a cycle.
    pub fn has_cycles(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn visit(steps: &[ExecutionStep], node: usize, colors: &mut [Color]) -> bool {
            colors[node] = Color::Gray;
            for &dep in &steps[node].dependencies {
                if dep >= steps.len() {
                    continue; // dangling index; reported by validation
                }
                match colors[dep] {
                    Color::Gray => return true,
                    Color::White => {
                        if visit(steps, dep, colors) {
                            return true;
                        }
                    }
                    Color::Black => {}
                }
            }
            colors[node] = Color::Black;
            false
        }

        let mut colors = vec![Color::White; self.steps.len()];
        for node in 0..self.steps.len() {
            if colors[node] == Color::White && visit(&self.steps, node, &mut colors) {
                return true;
            }
        }
        false
    }

    /// Derives a plan that undoes the executed steps in reverse order.
    ///
    /// Only steps with `executed`, `can_rollback`, and recorded rollback SQL
    /// participate. Rollback steps are chained sequentially so the reverse
    /// order is preserved under any executor.
    pub fn generate_rollback_plan(&self) -> ExecutionPlan {
        let mut rollback = ExecutionPlan::new(
            format!("{}_rollback", self.id),
            format!("Rollback of {}", self.name),
        );
        rollback.metadata = PlanMetadata {
            created_at: None,
            operation_count: 0,
            rollback_enabled: false,
            parallel_execution: false,
        };

        let mut previous: Option<usize> = None;
        for original in self.steps.iter().rev() {
            if !original.executed || !original.can_generate_rollback() {
                continue;
            }

            let mut step = ExecutionStep::new(
                format!("rollback_{}", original.id),
                format!("Rollback: {}", original.description),
                ExecutionPhase::SchemaDrop,
            );
            step.sql = original.rollback_sql.clone();
            step.options.can_rollback = false;
            step.options.timeout_ms = original.options.timeout_ms;
            step.estimated_ms = original.estimated_ms;

            let index = rollback.add_step(step);
            if let Some(prev) = previous {
                // Indices are created in order, so this cannot fail.
                let _ = rollback.add_dependency(index, prev);
            }
            previous = Some(index);
        }

        rollback.metadata.operation_count = rollback.steps.len();
        rollback.compiled = true;
        rollback
    }
}
