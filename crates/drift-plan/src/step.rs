//! Execution steps -- plan nodes wrapping SQL statements with rollback and
//! timing metadata.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ===========================================================================
// ExecutionPhase
// ===========================================================================

/// Coarse grouping of steps. Phases execute in ascending ordinal order:
/// drops before creates before data before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    PreMigration,
    SchemaDrop,
    SchemaCreate,
    DataMigration,
    PostMigration,
    Validation,
}

impl ExecutionPhase {
    /// All phases in execution order.
    pub const ALL: [Self; 6] = [
        Self::PreMigration,
        Self::SchemaDrop,
        Self::SchemaCreate,
        Self::DataMigration,
        Self::PostMigration,
        Self::Validation,
    ];

    /// Stable ordinal; lower executes first.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::PreMigration => 0,
            Self::SchemaDrop => 1,
            Self::SchemaCreate => 2,
            Self::DataMigration => 3,
            Self::PostMigration => 4,
            Self::Validation => 5,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreMigration => "pre_migration",
            Self::SchemaDrop => "schema_drop",
            Self::SchemaCreate => "schema_create",
            Self::DataMigration => "data_migration",
            Self::PostMigration => "post_migration",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===========================================================================
// StepOptions
// ===========================================================================

/// Per-step execution options. Timeouts are advisory; the external executor
/// enforces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOptions {
    pub can_rollback: bool,
    pub timeout_ms: u64,
    pub retry_count: u32,
    pub continue_on_error: bool,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            can_rollback: true,
            timeout_ms: 30_000,
            retry_count: 0,
            continue_on_error: false,
        }
    }
}

// ===========================================================================
// ExecutionStep
// ===========================================================================

/// A plan node wrapping one or more SQL statements.
///
/// Dependencies are indices into the owning plan's step arena; a step never
/// depends on itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Unique within the plan.
    pub id: String,

    pub description: String,

    /// Ordered SQL statements. Empty only for the synthetic validation
    /// checkpoint.
    #[serde(default)]
    pub sql: Vec<String>,

    pub phase: ExecutionPhase,

    #[serde(default)]
    pub options: StepOptions,

    /// Indices of steps that must execute before this one.
    #[serde(default)]
    pub dependencies: BTreeSet<usize>,

    /// Inverse statements, in execution order. Empty when the step cannot be
    /// undone automatically.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rollback_sql: Vec<String>,

    /// Heuristic duration estimate.
    #[serde(default)]
    pub estimated_ms: u64,

    /// Runtime flag, written by the external executor and read by rollback
    /// plan generation.
    #[serde(default)]
    pub executed: bool,
}

impl ExecutionStep {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        phase: ExecutionPhase,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            sql: Vec::new(),
            phase,
            options: StepOptions::default(),
            dependencies: BTreeSet::new(),
            rollback_sql: Vec::new(),
            estimated_ms: 0,
            executed: false,
        }
    }

    /// Returns `true` if a rollback step can be generated from this step.
    pub fn can_generate_rollback(&self) -> bool {
        self.options.can_rollback && !self.rollback_sql.is_empty()
    }
}
