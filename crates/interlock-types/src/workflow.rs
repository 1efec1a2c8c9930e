//! Workflow and step definitions.
//!
//! A [`WorkflowDefinition`] is an ordered list of [`StepDefinition`]s plus
//! seed variables and workflow-wide error policy. Definitions are immutable
//! once a run starts; every run produces fresh results.
//!
//! Definitions are normally authored as YAML:
//!
//! ```yaml
//! name: create-user
//! variables:
//!   email: alice@example.com
//! steps:
//!   - name: create
//!     action:
//!       domain: api
//!       method: POST
//!       endpoint: /users
//!       body: { email: "{{.email}}" }
//!     validation: { domain: api, status: 201 }
//!     output_bindings:
//!       userId: body.id
//!     rollback:
//!       name: delete-user
//!       action: { domain: api, method: DELETE, endpoint: "/users/{{.userId}}" }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Domain, StepAction, Validation};

// ---------------------------------------------------------------------------
// Workflow Definition
// ---------------------------------------------------------------------------

/// An ordered, cross-domain test workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Human-readable workflow name, used in logs and reports.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form labels used for filtering (`interlock run --tag`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Seed bindings placed in the variable store before the first step.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Value>,
    /// Steps, executed strictly in order.
    pub steps: Vec<StepDefinition>,
    /// Cleanup steps run (in order) after the compensation ledger is walked.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rollback_steps: Vec<StepDefinition>,
    #[serde(default)]
    pub error_policy: WorkflowErrorPolicy,
    /// Upper bound on the whole run (None = runner default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            tags: Vec::new(),
            variables: BTreeMap::new(),
            steps: Vec::new(),
            rollback_steps: Vec::new(),
            error_policy: WorkflowErrorPolicy::default(),
            timeout_secs: None,
        }
    }

    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_rollback_step(mut self, step: StepDefinition) -> Self {
        self.rollback_steps.push(step);
        self
    }

    pub fn with_error_policy(mut self, policy: WorkflowErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Every domain referenced by a step, a step rollback or a rollback step.
    pub fn domains(&self) -> Vec<Domain> {
        let mut domains: Vec<Domain> = self
            .steps
            .iter()
            .flat_map(|s| {
                std::iter::once(s.domain()).chain(s.rollback.as_ref().map(|r| r.domain()))
            })
            .chain(self.rollback_steps.iter().map(|s| s.domain()))
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }
}

/// Workflow-wide failure defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowErrorPolicy {
    /// Keep going after a failed step unless the step overrides it.
    #[serde(default)]
    pub continue_on_error: bool,
    /// Compensate on any aborting failure.
    #[serde(default)]
    pub rollback_on_failure: bool,
}

// ---------------------------------------------------------------------------
// Step Definition
// ---------------------------------------------------------------------------

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Unique within a workflow.
    pub name: String,
    pub action: StepAction,
    /// None = fire-and-forget (dispatch success alone passes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    /// Variable name -> extraction expression over the raw outcome.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output_bindings: BTreeMap<String, String>,
    #[serde(default)]
    pub error_handling: StepErrorPolicy,
    /// Compensating step run if a later failure triggers rollback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<Box<StepDefinition>>,
    #[serde(default, skip_serializing_if = "RunCondition::is_always")]
    pub run_condition: RunCondition,
    /// Per-attempt timeout (None = runner default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl StepDefinition {
    pub fn new(name: impl Into<String>, action: StepAction) -> Self {
        Self {
            name: name.into(),
            action,
            validation: None,
            output_bindings: BTreeMap::new(),
            error_handling: StepErrorPolicy::default(),
            rollback: None,
            run_condition: RunCondition::Always,
            timeout_secs: None,
        }
    }

    pub fn domain(&self) -> Domain {
        self.action.domain()
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn with_binding(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.output_bindings.insert(name.into(), expression.into());
        self
    }

    pub fn with_error_handling(mut self, policy: StepErrorPolicy) -> Self {
        self.error_handling = policy;
        self
    }

    pub fn with_rollback(mut self, rollback: StepDefinition) -> Self {
        self.rollback = Some(Box::new(rollback));
        self
    }

    pub fn with_condition(mut self, condition: RunCondition) -> Self {
        self.run_condition = condition;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Failure semantics for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepErrorPolicy {
    /// Invert validation: a mismatch passes, a match fails.
    #[serde(default)]
    pub expect_failure: bool,
    /// None inherits [`WorkflowErrorPolicy::continue_on_error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,
    /// Extra attempts after a driver error.
    #[serde(default)]
    pub max_retries: u32,
    /// Fixed delay between attempts.
    #[serde(default)]
    pub retry_delay_ms: u64,
    /// Run compensations if this step aborts the workflow.
    #[serde(default)]
    pub trigger_rollback: bool,
}

impl StepErrorPolicy {
    pub fn with_retries(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    pub fn expecting_failure(mut self) -> Self {
        self.expect_failure = true;
        self
    }

    pub fn continuing(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = Some(continue_on_error);
        self
    }

    pub fn triggering_rollback(mut self) -> Self {
        self.trigger_rollback = true;
        self
    }

    /// Step setting wins over the workflow default.
    pub fn effective_continue(&self, workflow: &WorkflowErrorPolicy) -> bool {
        self.continue_on_error.unwrap_or(workflow.continue_on_error)
    }

    /// Either level may request compensation.
    pub fn effective_rollback(&self, workflow: &WorkflowErrorPolicy) -> bool {
        self.trigger_rollback || workflow.rollback_on_failure
    }
}

// ---------------------------------------------------------------------------
// Run Condition
// ---------------------------------------------------------------------------

/// Predicate over prior results deciding whether a step runs.
///
/// "Previous" refers to the most recent result, including skipped ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum RunCondition {
    #[default]
    Always,
    PreviousFailed,
    PreviousPassed,
    StepPassed { step: String },
    StepFailed { step: String },
    /// Boolean expression with `steps`, `previous` and `vars` in scope.
    Expression { expr: String },
}

impl RunCondition {
    pub fn is_always(&self) -> bool {
        matches!(self, RunCondition::Always)
    }

    /// Step name this condition refers to, if any.
    pub fn referenced_step(&self) -> Option<&str> {
        match self {
            RunCondition::StepPassed { step } | RunCondition::StepFailed { step } => Some(step),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
