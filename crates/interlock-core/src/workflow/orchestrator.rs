//! Workflow orchestrator: the run loop.
//!
//! For each step, in definition order:
//! 1. Evaluate `run_condition`; false records `Skipped`
//! 2. Interpolate the action; an unbound variable records `Error` and aborts
//! 3. Dispatch with retries; a driver error after the last retry records `Error`
//! 4. Validate; `expect_failure` inverts the verdict
//! 5. Bind outputs (atomically per step); record a compensation if the step passed
//! 6. On Failed/Error without effective `continue_on_error`, abort and roll
//!    back if the step or workflow asks for it
//!
//! The run is bounded by a workflow timeout and a cancellation token. Either
//! one stops the in-flight step (recorded `Error`) and rolls back if
//! anything is compensable.
//!
//! Contract violations (invalid definition, missing driver) are returned as
//! `Err` before the first step runs; every other outcome is reported in the
//! returned `WorkflowResult`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use interlock_types::config::RunnerConfig;
use interlock_types::domain::{Domain, RawOutcome};
use interlock_types::event::RunEvent;
use interlock_types::result::{AbortReason, StepResult, StepStatus, WorkflowResult, WorkflowStatus};
use interlock_types::workflow::{StepDefinition, WorkflowDefinition};

use crate::driver::DriverRegistry;
use crate::event::EventBus;

use super::condition::ConditionEvaluator;
use super::definition::{validate_definition, DefinitionError};
use super::dispatcher::{DispatchError, RunScope, StepDispatcher};
use super::extract::{extract, ExtractionError};
use super::rollback::RollbackCoordinator;
use super::variables::VariableStore;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default workflow-level timeout (10 minutes).
const DEFAULT_WORKFLOW_TIMEOUT_SECS: u64 = 600;

/// Default per-attempt step timeout (1 minute).
const DEFAULT_STEP_TIMEOUT_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Contract violations detected before a run starts.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(#[from] DefinitionError),

    #[error("no driver registered for domain '{domain}' (needed by step '{step}')")]
    MissingDriver { domain: Domain, step: String },
}

// ---------------------------------------------------------------------------
// WorkflowOrchestrator
// ---------------------------------------------------------------------------

/// Executes workflows against a shared driver registry.
///
/// Each run owns its variable store and rollback ledger; the orchestrator
/// itself only tracks cancellation tokens for active runs, so one instance
/// can serve concurrent runs behind an `Arc`.
pub struct WorkflowOrchestrator {
    dispatcher: StepDispatcher,
    default_workflow_timeout: Duration,
    events: Option<EventBus>,
    cancellation_tokens: DashMap<Uuid, CancellationToken>,
}

/// How a step's execution ended the run early, if it did.
enum Stop {
    UnresolvedVariable { variable: String },
    Interrupted(AbortReason),
}

struct StepRun {
    result: StepResult,
    stop: Option<Stop>,
}

impl StepRun {
    fn done(result: StepResult) -> Self {
        Self { result, stop: None }
    }
}

impl WorkflowOrchestrator {
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self {
            dispatcher: StepDispatcher::new(
                registry,
                Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
            ),
            default_workflow_timeout: Duration::from_secs(DEFAULT_WORKFLOW_TIMEOUT_SECS),
            events: None,
            cancellation_tokens: DashMap::new(),
        }
    }

    /// An orchestrator with timeouts taken from `config`.
    pub fn from_config(registry: Arc<DriverRegistry>, config: &RunnerConfig) -> Self {
        Self::new(registry).with_timeouts(
            Duration::from_secs(config.default_workflow_timeout_secs),
            Duration::from_secs(config.default_step_timeout_secs),
        )
    }

    /// Defaults for workflows and steps that do not set `timeout_secs`.
    pub fn with_timeouts(mut self, workflow: Duration, step: Duration) -> Self {
        self.dispatcher = self.dispatcher.with_default_step_timeout(step);
        self.default_workflow_timeout = workflow;
        self
    }

    /// Publish run events on `events`.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.dispatcher = self.dispatcher.with_events(events.clone());
        self.events = Some(events);
        self
    }

    pub fn registry(&self) -> &DriverRegistry {
        self.dispatcher.registry()
    }

    /// Check that `def` is valid and every domain it uses has a driver.
    pub fn preflight(&self, def: &WorkflowDefinition) -> Result<(), OrchestratorError> {
        validate_definition(def)?;

        let all_steps = def
            .steps
            .iter()
            .flat_map(|s| std::iter::once(s).chain(s.rollback.as_deref()))
            .chain(def.rollback_steps.iter());
        for step in all_steps {
            let domain = step.domain();
            if !self.registry().contains(domain) {
                return Err(OrchestratorError::MissingDriver {
                    domain,
                    step: step.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Run `def` to completion.
    pub async fn run(&self, def: &WorkflowDefinition) -> Result<WorkflowResult, OrchestratorError> {
        self.run_with_cancellation(def, CancellationToken::new())
            .await
    }

    /// Run `def`, stopping early if `cancel` fires.
    pub async fn run_with_cancellation(
        &self,
        def: &WorkflowDefinition,
        cancel: CancellationToken,
    ) -> Result<WorkflowResult, OrchestratorError> {
        self.run_with_id(def, Uuid::now_v7(), cancel).await
    }

    /// Run `def` under a caller-chosen run ID, so it can be cancelled with
    /// [`cancel`](Self::cancel) while in flight.
    pub async fn run_with_id(
        &self,
        def: &WorkflowDefinition,
        run_id: Uuid,
        cancel: CancellationToken,
    ) -> Result<WorkflowResult, OrchestratorError> {
        self.preflight(def)?;

        self.cancellation_tokens.insert(run_id, cancel.clone());
        let result = self.execute(def, run_id, cancel).await;
        self.cancellation_tokens.remove(&run_id);

        Ok(result)
    }

    /// Cancel an active run. Returns false if no such run is active.
    pub fn cancel(&self, run_id: Uuid) -> bool {
        match self.cancellation_tokens.get(&run_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(%run_id, "workflow run cancellation requested");
                true
            }
            None => false,
        }
    }

    /// IDs of runs currently executing.
    pub fn active_runs(&self) -> Vec<Uuid> {
        self.cancellation_tokens.iter().map(|e| *e.key()).collect()
    }

    fn publish(&self, event: RunEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    // -----------------------------------------------------------------------
    // Run loop
    // -----------------------------------------------------------------------

    async fn execute(
        &self,
        def: &WorkflowDefinition,
        run_id: Uuid,
        cancel: CancellationToken,
    ) -> WorkflowResult {
        let start_time = Utc::now();
        let timeout = def
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_workflow_timeout);
        // A timeout too large to represent as an instant means no deadline.
        let scope = RunScope::new(run_id, cancel, Instant::now().checked_add(timeout));

        let mut store = VariableStore::seeded(&def.variables);
        let mut ledger = RollbackCoordinator::new();
        let mut step_results: Vec<StepResult> = Vec::with_capacity(def.steps.len());
        let mut abort_reason: Option<AbortReason> = None;
        let mut rollback_requested = false;
        let mut interrupted = false;

        tracing::info!(
            %run_id,
            workflow = %def.name,
            steps = def.steps.len(),
            timeout_secs = timeout.as_secs(),
            "workflow run started"
        );
        self.publish(RunEvent::RunStarted {
            run_id,
            workflow: def.name.clone(),
            step_count: def.steps.len(),
        });

        for (index, step) in def.steps.iter().enumerate() {
            if let Some(reason) = interruption(&scope, timeout) {
                abort_reason = Some(reason);
                interrupted = true;
                break;
            }

            let StepRun { result, stop } = self
                .run_step(&scope, timeout, index, step, &step_results, &mut store)
                .await;
            let status = result.status;

            if status == StepStatus::Passed {
                if let Some(compensation) = &step.rollback {
                    ledger.record(&step.name, compensation);
                }
            }

            tracing::info!(
                %run_id,
                step = %step.name,
                status = %status,
                duration_ms = result.duration_ms,
                retries = result.retries_used,
                "step finished"
            );
            self.publish(RunEvent::StepFinished {
                run_id,
                step: step.name.clone(),
                status,
                duration_ms: result.duration_ms,
            });
            step_results.push(result);

            let policy = &step.error_handling;
            match stop {
                Some(Stop::UnresolvedVariable { variable }) => {
                    abort_reason = Some(AbortReason::UnresolvedVariable {
                        step: step.name.clone(),
                        variable,
                    });
                    rollback_requested = policy.effective_rollback(&def.error_policy);
                    break;
                }
                Some(Stop::Interrupted(reason)) => {
                    abort_reason = Some(reason);
                    interrupted = true;
                    break;
                }
                None => {}
            }

            if status.is_failure() && !policy.effective_continue(&def.error_policy) {
                tracing::warn!(%run_id, step = %step.name, "step failed, aborting workflow");
                abort_reason = Some(AbortReason::StepFailed {
                    step: step.name.clone(),
                });
                rollback_requested = policy.effective_rollback(&def.error_policy);
                break;
            }
        }

        let should_roll_back = if interrupted {
            !ledger.is_empty() || !def.rollback_steps.is_empty()
        } else {
            abort_reason.is_some() && rollback_requested
        };

        let (rollback_executed, rollback_results) = if should_roll_back {
            let results = ledger
                .execute(
                    &self.dispatcher,
                    run_id,
                    &def.rollback_steps,
                    &store,
                    self.events.as_ref(),
                )
                .await;
            (true, results)
        } else {
            (false, Vec::new())
        };

        let status = match &abort_reason {
            Some(_) if rollback_executed => WorkflowStatus::RolledBack,
            Some(_) => WorkflowStatus::Aborted,
            None if step_results.iter().any(|r| r.status.is_failure()) => WorkflowStatus::Failed,
            None => WorkflowStatus::Completed,
        };

        let result = WorkflowResult {
            run_id,
            name: def.name.clone(),
            status,
            abort_reason,
            step_results,
            rollback_executed,
            rollback_results,
            variables: store.snapshot(),
            start_time,
            end_time: Utc::now(),
        };

        match &result.abort_reason {
            Some(reason) => tracing::warn!(
                %run_id,
                workflow = %def.name,
                status = %status,
                reason = %reason,
                duration_ms = result.duration_ms(),
                "workflow run stopped early"
            ),
            None => tracing::info!(
                %run_id,
                workflow = %def.name,
                status = %status,
                duration_ms = result.duration_ms(),
                "workflow run finished"
            ),
        }
        self.publish(RunEvent::RunFinished {
            run_id,
            workflow: def.name.clone(),
            status,
            duration_ms: result.duration_ms(),
        });

        result
    }

    async fn run_step(
        &self,
        scope: &RunScope,
        workflow_timeout: Duration,
        index: usize,
        step: &StepDefinition,
        prior: &[StepResult],
        store: &mut VariableStore,
    ) -> StepRun {
        let run_id = scope.run_id;

        match ConditionEvaluator::should_run(step, prior, store) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(%run_id, step = %step.name, "run condition false, skipping");
                return StepRun::done(StepResult::skipped(&step.name));
            }
            Err(e) => {
                tracing::warn!(%run_id, step = %step.name, error = %e, "run condition failed");
                return StepRun::done(StepResult::error(&step.name, e.to_string()));
            }
        }

        self.publish(RunEvent::StepStarted {
            run_id,
            step: step.name.clone(),
            domain: step.domain(),
            index,
        });

        let started_at = Utc::now();
        let dispatched = match self.dispatcher.dispatch(scope, step, store).await {
            Ok(dispatched) => dispatched,
            Err(e) => {
                let mut result = StepResult::error(&step.name, e.to_string());
                result.started_at = started_at;
                result.duration_ms = e.duration().as_millis() as u64;
                result.retries_used = e.retries_used();
                let stop = match e {
                    DispatchError::Template(template) => Some(Stop::UnresolvedVariable {
                        variable: template.variable().to_string(),
                    }),
                    DispatchError::Cancelled { .. } => {
                        Some(Stop::Interrupted(AbortReason::Cancelled))
                    }
                    DispatchError::DeadlineExceeded { .. } => {
                        Some(Stop::Interrupted(AbortReason::Timeout {
                            after_secs: workflow_timeout.as_secs(),
                        }))
                    }
                    _ => None,
                };
                return StepRun { result, stop };
            }
        };

        let mut result = StepResult::new(&step.name, StepStatus::Passed);
        result.started_at = started_at;
        result.duration_ms = dispatched.duration.as_millis() as u64;
        result.retries_used = dispatched.retries_used;

        if let Some(validation) = &step.validation {
            let check = self.dispatcher.validate(&dispatched.outcome, validation);
            let expect_failure = step.error_handling.expect_failure;
            match (check.passed, expect_failure) {
                (true, false) | (false, true) => {}
                (false, false) => {
                    result.status = StepStatus::Failed;
                    result.error = Some("validation failed".to_string());
                }
                (true, true) => {
                    result.status = StepStatus::Failed;
                    result.error = Some("expected validation to fail, but it passed".to_string());
                }
            }
            result.validation_detail = Some(check.detail);
        } else if step.error_handling.expect_failure {
            result.status = StepStatus::Failed;
            result.error = Some("expect_failure set without a validation".to_string());
        }

        match bind_outputs(step, &dispatched.outcome) {
            Ok(bindings) => {
                for (name, value) in bindings {
                    store.bind(name, value);
                }
            }
            Err((name, e)) => {
                tracing::warn!(%run_id, step = %step.name, binding = %name, error = %e, "output extraction failed");
                result.status = StepStatus::Error;
                result.error = Some(format!("output binding '{name}': {e}"));
            }
        }

        result.raw_outcome = Some(dispatched.outcome);
        StepRun::done(result)
    }
}

/// Why the run must stop before the next step, if it must.
fn interruption(scope: &RunScope, timeout: Duration) -> Option<AbortReason> {
    if scope.cancel.is_cancelled() {
        Some(AbortReason::Cancelled)
    } else if scope.deadline_passed() {
        Some(AbortReason::Timeout {
            after_secs: timeout.as_secs(),
        })
    } else {
        None
    }
}

/// Extract every binding of `step`, or report the first that fails.
///
/// Nothing is written to the store unless all extractions succeed.
fn bind_outputs(
    step: &StepDefinition,
    outcome: &RawOutcome,
) -> Result<Vec<(String, Value)>, (String, ExtractionError)> {
    step.output_bindings
        .iter()
        .map(|(name, expression)| {
            extract(outcome, expression)
                .map(|value| (name.clone(), value))
                .map_err(|e| (name.clone(), e))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use interlock_types::domain::{
        CustomAction, CustomOutcome, CustomValidation, PathAssertion, StepAction, Validation,
    };
    use interlock_types::workflow::{StepErrorPolicy, WorkflowErrorPolicy};
    use serde_json::{json, Map};

    use crate::driver::{DomainDriver, DriverError};

    /// Echoes params back as data; the handler `fail` errors.
    struct Echo;

    impl DomainDriver for Echo {
        fn domain(&self) -> Domain {
            Domain::Custom
        }

        async fn execute(&self, action: &StepAction) -> Result<RawOutcome, DriverError> {
            let StepAction::Custom(custom) = action else {
                return Err(DriverError::InvalidAction("expected custom".into()));
            };
            if custom.handler == "fail" {
                return Err(DriverError::Handler("always fails".into()));
            }
            Ok(RawOutcome::Custom(CustomOutcome {
                data: Value::Object(custom.params.clone()),
            }))
        }
    }

    fn orchestrator() -> WorkflowOrchestrator {
        WorkflowOrchestrator::new(Arc::new(DriverRegistry::new().with(Echo)))
    }

    fn step(name: &str, handler: &str, params: Value) -> StepDefinition {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        StepDefinition::new(
            name,
            StepAction::Custom(CustomAction {
                handler: handler.to_string(),
                params,
            }),
        )
    }

    fn expects(path: &str, value: Value) -> Validation {
        Validation::Custom(CustomValidation {
            assertions: vec![PathAssertion {
                path: path.to_string(),
                equals: Some(value),
                ..Default::default()
            }],
            expression: None,
        })
    }

    #[tokio::test]
    async fn all_passing_steps_complete() {
        let def = WorkflowDefinition::new("wf")
            .with_step(step("a", "echo", json!({ "x": 1 })).with_validation(expects("x", json!(1))))
            .with_step(step("b", "echo", json!({})));
        let result = orchestrator().run(&def).await.unwrap();
        assert_eq!(result.status, WorkflowStatus::Completed);
        assert!(!result.rollback_executed);
        assert_eq!(result.count(StepStatus::Passed), 2);
        assert!(result.abort_reason.is_none());
    }

    #[tokio::test]
    async fn failure_without_continue_stops_early() {
        let def = WorkflowDefinition::new("wf")
            .with_step(step("a", "echo", json!({ "x": 1 })).with_validation(expects("x", json!(2))))
            .with_step(step("b", "echo", json!({})));
        let result = orchestrator().run(&def).await.unwrap();
        assert_eq!(result.status, WorkflowStatus::Aborted);
        assert_eq!(result.step_results.len(), 1);
        assert_eq!(result.step_results[0].status, StepStatus::Failed);
        assert_eq!(
            result.abort_reason,
            Some(AbortReason::StepFailed { step: "a".to_string() })
        );
    }

    #[tokio::test]
    async fn continue_on_error_reaches_the_end_as_failed() {
        let def = WorkflowDefinition::new("wf")
            .with_step(
                step("a", "fail", json!({}))
                    .with_error_handling(StepErrorPolicy::default().continuing(true)),
            )
            .with_step(step("b", "echo", json!({})));
        let result = orchestrator().run(&def).await.unwrap();
        assert_eq!(result.status, WorkflowStatus::Failed);
        assert_eq!(result.step_results.len(), 2);
        assert_eq!(result.step_results[0].status, StepStatus::Error);
        assert_eq!(result.step_results[1].status, StepStatus::Passed);
    }

    #[tokio::test]
    async fn step_level_continue_overrides_workflow() {
        let def = WorkflowDefinition::new("wf")
            .with_error_policy(WorkflowErrorPolicy {
                continue_on_error: true,
                rollback_on_failure: false,
            })
            .with_step(
                step("a", "fail", json!({}))
                    .with_error_handling(StepErrorPolicy::default().continuing(false)),
            )
            .with_step(step("b", "echo", json!({})));
        let result = orchestrator().run(&def).await.unwrap();
        assert_eq!(result.status, WorkflowStatus::Aborted);
        assert_eq!(result.step_results.len(), 1);
    }

    #[tokio::test]
    async fn unresolved_variable_is_fatal_even_with_continue() {
        let def = WorkflowDefinition::new("wf")
            .with_step(
                step("a", "echo", json!({ "id": "{{.nope}}" }))
                    .with_error_handling(StepErrorPolicy::default().continuing(true)),
            )
            .with_step(step("b", "echo", json!({})));
        let result = orchestrator().run(&def).await.unwrap();
        assert_eq!(result.status, WorkflowStatus::Aborted);
        assert_eq!(result.step_results.len(), 1);
        assert_eq!(result.step_results[0].status, StepStatus::Error);
        assert_eq!(
            result.abort_reason,
            Some(AbortReason::UnresolvedVariable {
                step: "a".to_string(),
                variable: "nope".to_string()
            })
        );
    }

    #[tokio::test]
    async fn expect_failure_inverts_validation() {
        let mismatch = WorkflowDefinition::new("wf").with_step(
            step("a", "echo", json!({ "x": 1 }))
                .with_validation(expects("x", json!(2)))
                .with_error_handling(StepErrorPolicy::default().expecting_failure()),
        );
        let result = orchestrator().run(&mismatch).await.unwrap();
        assert_eq!(result.step_results[0].status, StepStatus::Passed);
        assert_eq!(result.status, WorkflowStatus::Completed);

        let matching = WorkflowDefinition::new("wf").with_step(
            step("a", "echo", json!({ "x": 1 }))
                .with_validation(expects("x", json!(1)))
                .with_error_handling(StepErrorPolicy::default().expecting_failure()),
        );
        let result = orchestrator().run(&matching).await.unwrap();
        assert_eq!(result.step_results[0].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn outputs_bind_even_when_validation_fails() {
        let def = WorkflowDefinition::new("wf").with_step(
            step("a", "echo", json!({ "token": "t-1" }))
                .with_validation(expects("token", json!("other")))
                .with_binding("token", "token")
                .with_error_handling(StepErrorPolicy::default().continuing(true)),
        );
        let result = orchestrator().run(&def).await.unwrap();
        assert_eq!(result.step_results[0].status, StepStatus::Failed);
        assert_eq!(result.variables.get("token"), Some(&json!("t-1")));
    }

    #[tokio::test]
    async fn failed_extraction_binds_nothing() {
        let def = WorkflowDefinition::new("wf").with_step(
            step("a", "echo", json!({ "token": "t-1" }))
                .with_binding("a_token", "token")
                .with_binding("b_missing", "missing"),
        );
        let result = orchestrator().run(&def).await.unwrap();
        assert_eq!(result.step_results[0].status, StepStatus::Error);
        assert!(result.step_results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("b_missing"));
        assert!(result.variables.get("a_token").is_none());
        assert_eq!(result.status, WorkflowStatus::Aborted);
    }

    #[tokio::test]
    async fn skipped_steps_do_not_fail_the_run() {
        use interlock_types::workflow::RunCondition;
        let def = WorkflowDefinition::new("wf")
            .with_step(step("a", "echo", json!({})))
            .with_step(step("b", "echo", json!({})).with_condition(RunCondition::PreviousFailed));
        let result = orchestrator().run(&def).await.unwrap();
        assert_eq!(result.step_results[1].status, StepStatus::Skipped);
        assert_eq!(result.step_results[1].duration_ms, 0);
        assert_eq!(result.status, WorkflowStatus::Completed);
    }

    #[tokio::test]
    async fn missing_driver_is_a_contract_violation() {
        let orchestrator = WorkflowOrchestrator::new(Arc::new(DriverRegistry::new()));
        let def = WorkflowDefinition::new("wf").with_step(step("a", "echo", json!({})));
        assert!(matches!(
            orchestrator.run(&def).await,
            Err(OrchestratorError::MissingDriver { domain: Domain::Custom, .. })
        ));
    }

    #[tokio::test]
    async fn invalid_definition_is_a_contract_violation() {
        let def = WorkflowDefinition::new("wf");
        assert!(matches!(
            orchestrator().run(&def).await,
            Err(OrchestratorError::InvalidDefinition(_))
        ));
    }

    #[tokio::test]
    async fn unrepresentable_timeout_runs_without_deadline() {
        let def = WorkflowDefinition::new("wf")
            .with_timeout_secs(u64::MAX)
            .with_step(step("a", "echo", json!({})));
        let result = orchestrator().run(&def).await.unwrap();
        assert_eq!(result.status, WorkflowStatus::Completed);

        let unbounded = WorkflowOrchestrator::new(Arc::new(DriverRegistry::new().with(Echo)))
            .with_timeouts(Duration::from_secs(u64::MAX), Duration::from_secs(u64::MAX));
        let def = WorkflowDefinition::new("wf").with_step(step("a", "echo", json!({})));
        let result = unbounded.run(&def).await.unwrap();
        assert_eq!(result.status, WorkflowStatus::Completed);
    }

    #[tokio::test]
    async fn seed_variables_are_visible() {
        let def = WorkflowDefinition::new("wf")
            .with_variable("user", json!("alice"))
            .with_step(
                step("a", "echo", json!({ "who": "{{.user}}" }))
                    .with_validation(expects("who", json!("alice"))),
            );
        let result = orchestrator().run(&def).await.unwrap();
        assert_eq!(result.status, WorkflowStatus::Completed);
        assert_eq!(result.variables.get("user"), Some(&json!("alice")));
    }

    #[tokio::test]
    async fn cancel_unknown_run_returns_false() {
        assert!(!orchestrator().cancel(Uuid::now_v7()));
        assert!(orchestrator().active_runs().is_empty());
    }
}
