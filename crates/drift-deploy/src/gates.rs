//! Production safety gates.
//!
//! Pure business rules over observed state: the surrounding tooling runs
//! git / test commands and feeds the results in; every check returns a
//! structured result so all problems can be reported at once.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use drift_core::ports::{ClockPort, iso_millis};

// ===========================================================================
// SafetyGate
// ===========================================================================

/// The gates that stand between a request and a production operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SafetyGate {
    #[serde(rename = "git-clean-check")]
    GitClean,
    #[serde(rename = "branch-validation")]
    Branch,
    #[serde(rename = "test-validation")]
    Tests,
    #[serde(rename = "production-confirmation")]
    Confirmation,
}

impl SafetyGate {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitClean => "git-clean-check",
            Self::Branch => "branch-validation",
            Self::Tests => "test-validation",
            Self::Confirmation => "production-confirmation",
        }
    }

    /// Remediation hint shown when the gate fails.
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::GitClean => "Commit or stash working tree changes before deploying",
            Self::Branch => "Switch to the expected deployment branch",
            Self::Tests => "Fix failing tests and restore coverage above the threshold",
            Self::Confirmation => "Re-run with the exact production confirmation phrase",
        }
    }
}

impl fmt::Display for SafetyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===========================================================================
// Configuration
// ===========================================================================

/// Configuration for a gated operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Label of the requested operation (used for audit entries).
    pub operation: String,

    pub environment: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_branch: Option<String>,

    /// Minimum acceptable total coverage, in percent.
    pub coverage_threshold: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_phrase: Option<String>,

    /// Bypass all gates; demands a separate force confirmation upstream.
    #[serde(default)]
    pub force: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            operation: String::new(),
            environment: "development".to_owned(),
            expected_branch: None,
            coverage_threshold: 80.0,
            confirmation_phrase: None,
            force: false,
        }
    }
}

/// Structured result of [`validate_gate_config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validates a gate configuration.
pub fn validate_gate_config(config: &GateConfig) -> ConfigValidation {
    let mut errors = Vec::new();
    if config.operation.trim().is_empty() {
        errors.push("operation is required".to_owned());
    }
    if config.environment.trim().is_empty() {
        errors.push("environment is required".to_owned());
    }
    if !(0.0..=100.0).contains(&config.coverage_threshold) {
        errors.push(format!(
            "coverage_threshold must be between 0 and 100 (got {})",
            config.coverage_threshold
        ));
    }
    ConfigValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// The ordered gate list for one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatePlan {
    pub gates: Vec<SafetyGate>,

    /// Set when `force` bypasses every gate.
    pub skip_all: bool,

    /// A forced run must still be confirmed separately upstream.
    pub requires_force_confirmation: bool,
}

/// Builds the gate execution plan for a configuration.
///
/// The production confirmation gate only applies to the production
/// environment. `force` keeps the list (for audit) but marks it skipped.
pub fn create_gate_execution_plan(config: &GateConfig) -> GatePlan {
    let mut gates = vec![SafetyGate::GitClean, SafetyGate::Branch, SafetyGate::Tests];
    if config.environment == "production" {
        gates.push(SafetyGate::Confirmation);
    }
    GatePlan {
        gates,
        skip_all: config.force,
        requires_force_confirmation: config.force,
    }
}

// ===========================================================================
// Observed inputs
// ===========================================================================

/// Observed git working tree state, as reported by the surrounding tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkingTreeStatus {
    #[serde(default)]
    pub modified: Vec<String>,
    #[serde(default)]
    pub untracked: Vec<String>,
    #[serde(default)]
    pub staged: Vec<String>,
    #[serde(default)]
    pub deleted: Vec<String>,
}

impl WorkingTreeStatus {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty()
            && self.untracked.is_empty()
            && self.staged.is_empty()
            && self.deleted.is_empty()
    }
}

/// Observed test run results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestResults {
    pub passed: u64,
    pub failed: u64,
    /// Total coverage, in percent.
    pub coverage_total: f64,
}

// ===========================================================================
// Gate checks
// ===========================================================================

/// Result of one gate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCheck {
    pub passed: bool,
    pub issues: Vec<String>,
}

impl GateCheck {
    fn pass() -> Self {
        Self {
            passed: true,
            issues: Vec::new(),
        }
    }

    fn fail(issues: Vec<String>) -> Self {
        Self {
            passed: false,
            issues,
        }
    }
}

/// Validates a raw working-tree payload from the surrounding git tooling.
///
/// Shape problems are recoverable: the check fails with the parse error as
/// its issue, matching the structured-result policy for validators.
pub fn validate_working_tree_status(payload: &serde_json::Value) -> GateCheck {
    match serde_json::from_value::<WorkingTreeStatus>(payload.clone()) {
        Ok(status) => validate_git_status(&status),
        Err(e) => GateCheck::fail(vec![format!("malformed working tree payload: {e}")]),
    }
}

/// The working tree must be pristine before schema changes are deployed.
pub fn validate_git_status(status: &WorkingTreeStatus) -> GateCheck {
    let mut issues = Vec::new();
    let mut note = |label: &str, files: &[String]| {
        if !files.is_empty() {
            issues.push(format!("{} {} file(s)", files.len(), label));
        }
    };
    note("modified", &status.modified);
    note("untracked", &status.untracked);
    note("staged", &status.staged);
    note("deleted", &status.deleted);

    if issues.is_empty() {
        GateCheck::pass()
    } else {
        GateCheck::fail(issues)
    }
}

/// The current branch must match the expected deployment branch.
pub fn validate_branch(current: &str, expected: &str) -> GateCheck {
    if current.trim() == expected.trim() {
        GateCheck::pass()
    } else {
        GateCheck::fail(vec![format!(
            "on branch {}, expected {}",
            current.trim(),
            expected.trim()
        )])
    }
}

/// Tests must exist, pass completely, and clear the coverage threshold.
pub fn validate_test_results(results: &TestResults, coverage_threshold: f64) -> GateCheck {
    let mut issues = Vec::new();
    if results.failed > 0 {
        issues.push(format!("{} test(s) failed", results.failed));
    }
    if results.passed + results.failed == 0 {
        issues.push("no tests were run".to_owned());
    }
    if results.coverage_total < coverage_threshold {
        issues.push(format!(
            "coverage {:.1}% below threshold {:.1}%",
            results.coverage_total, coverage_threshold
        ));
    }

    if issues.is_empty() {
        GateCheck::pass()
    } else {
        GateCheck::fail(issues)
    }
}

/// The operator must type the exact confirmation phrase.
pub fn validate_confirmation(provided: &str, expected: &str) -> GateCheck {
    if provided.trim() == expected.trim() {
        GateCheck::pass()
    } else {
        GateCheck::fail(vec!["confirmation phrase does not match".to_owned()])
    }
}

// ===========================================================================
// Audit
// ===========================================================================

/// Outcome stamped into an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStatus {
    #[serde(rename = "PASSED")]
    Passed,
    #[serde(rename = "FAILED")]
    Failed,
}

/// One line of the safety audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub gate: SafetyGate,
    pub timestamp: String,
    pub status: GateStatus,
    pub issues: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Records the outcome of one gate check.
pub fn create_audit_entry(
    gate: SafetyGate,
    check: &GateCheck,
    operation: &str,
    clock: &impl ClockPort,
) -> AuditEntry {
    let mut metadata = BTreeMap::new();
    metadata.insert("operation".to_owned(), operation.to_owned());
    AuditEntry {
        gate,
        timestamp: iso_millis(&clock.now()),
        status: if check.passed {
            GateStatus::Passed
        } else {
            GateStatus::Failed
        },
        issues: check.issues.clone(),
        metadata,
    }
}

/// Aggregate verdict over an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyScore {
    /// Percentage of gates that passed.
    pub score: f64,
    pub all_passed: bool,
    pub critical_failures: Vec<SafetyGate>,
}

/// Aggregates an audit trail into a safety score.
///
/// An empty trail scores zero: nothing was checked, so nothing is safe.
pub fn calculate_safety_score(entries: &[AuditEntry]) -> SafetyScore {
    if entries.is_empty() {
        return SafetyScore {
            score: 0.0,
            all_passed: false,
            critical_failures: Vec::new(),
        };
    }

    let passed = entries
        .iter()
        .filter(|e| e.status == GateStatus::Passed)
        .count();
    let critical_failures: Vec<SafetyGate> = entries
        .iter()
        .filter(|e| e.status == GateStatus::Failed)
        .map(|e| e.gate)
        .collect();

    SafetyScore {
        score: passed as f64 / entries.len() as f64 * 100.0,
        all_passed: critical_failures.is_empty(),
        critical_failures,
    }
}

/// Per-gate remediation strings for every failed gate in the trail.
pub fn get_recommended_actions(entries: &[AuditEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.status == GateStatus::Failed)
        .map(|e| format!("{}: {}", e.gate, e.gate.remediation()))
        .collect()
}
