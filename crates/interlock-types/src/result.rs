//! Run results: per-step, per-workflow and per-suite.
//!
//! Results are terminal artifacts. They are built up by the orchestrator
//! during a run and never mutated after the run loop exits. All of them
//! serialize to JSON for reporting.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::RawOutcome;

// ---------------------------------------------------------------------------
// Validation Result
// ---------------------------------------------------------------------------

/// Outcome of checking a raw outcome against a validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    /// Human-readable diagnostics, one line per check.
    pub detail: String,
}

impl ValidationResult {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Step Result
// ---------------------------------------------------------------------------

/// Terminal status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    /// Dispatched, but validation did not hold.
    Failed,
    /// Run condition declined the step.
    Skipped,
    /// Never produced a usable outcome (driver, template, extraction or condition error).
    Error,
}

impl StepStatus {
    /// Failed or Error.
    pub fn is_failure(&self) -> bool {
        matches!(self, StepStatus::Failed | StepStatus::Error)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Passed => "passed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// The record of one executed (or skipped) step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    /// Sum of all attempt durations.
    pub duration_ms: u64,
    #[serde(default)]
    pub retries_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_outcome: Option<RawOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// For compensation results: the step being compensated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensates: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl StepResult {
    /// A fresh result with zero duration; callers fill the rest.
    pub fn new(name: impl Into<String>, status: StepStatus) -> Self {
        Self {
            name: name.into(),
            status,
            duration_ms: 0,
            retries_used: 0,
            raw_outcome: None,
            validation_detail: None,
            error: None,
            compensates: None,
            started_at: Utc::now(),
        }
    }

    pub fn skipped(name: impl Into<String>) -> Self {
        Self::new(name, StepStatus::Skipped)
    }

    pub fn error(name: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::new(name, StepStatus::Error);
        result.error = Some(error.into());
        result
    }
}

// ---------------------------------------------------------------------------
// Workflow Result
// ---------------------------------------------------------------------------

/// Lifecycle state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    /// Every non-skipped step passed.
    Completed,
    /// Reached the end, but a tolerated step failed.
    Failed,
    /// Stopped early without compensating.
    Aborted,
    /// Stopped early and compensations ran.
    RolledBack,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowStatus::Pending | WorkflowStatus::Running)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Aborted => "aborted",
            WorkflowStatus::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}

/// Why a run stopped before its last step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    StepFailed { step: String },
    UnresolvedVariable { step: String, variable: String },
    Timeout { after_secs: u64 },
    Cancelled,
    /// The run never produced a result of its own (its task panicked or the
    /// orchestrator rejected it).
    Lost { error: String },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::StepFailed { step } => write!(f, "step '{step}' failed"),
            AbortReason::UnresolvedVariable { step, variable } => {
                write!(f, "step '{step}' references unbound variable '{variable}'")
            }
            AbortReason::Timeout { after_secs } => write!(f, "timed out after {after_secs}s"),
            AbortReason::Cancelled => f.write_str("cancelled"),
            AbortReason::Lost { error } => write!(f, "run lost: {error}"),
        }
    }
}

/// The full record of one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub name: String,
    pub status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,
    /// In execution order; never longer than the step list.
    pub step_results: Vec<StepResult>,
    pub rollback_executed: bool,
    #[serde(default)]
    pub rollback_results: Vec<StepResult>,
    /// Variable store snapshot at the end of the run.
    #[serde(default)]
    pub variables: Map<String, Value>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl WorkflowResult {
    pub fn duration_ms(&self) -> u64 {
        (self.end_time - self.start_time).num_milliseconds().max(0) as u64
    }

    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.step_results.iter().filter(|r| r.status == status).count()
    }

    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.name == name)
    }
}

// ---------------------------------------------------------------------------
// Suite Result
// ---------------------------------------------------------------------------

/// Aggregate of independently executed runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    /// In submission order.
    pub results: Vec<WorkflowResult>,
}

impl SuiteResult {
    pub fn from_results(results: Vec<WorkflowResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
