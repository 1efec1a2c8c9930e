//! Concurrent suite execution.
//!
//! Runs a batch of workflows on one shared orchestrator, bounded by a
//! semaphore. Every definition is preflighted before any run starts, so a
//! broken file fails the whole suite up front instead of halfway through.
//! Results come back in submission order.
//!
//! Each run gets a child of the suite's cancellation token. Cancelling the
//! suite interrupts runs in flight (which roll back as usual) and ends runs
//! still waiting for a permit as `Aborted` without dispatching anything.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use interlock_types::result::{AbortReason, SuiteResult, WorkflowResult, WorkflowStatus};
use interlock_types::workflow::WorkflowDefinition;

use super::orchestrator::{OrchestratorError, WorkflowOrchestrator};

#[derive(Debug, thiserror::Error)]
#[error("workflow '{workflow}' cannot run: {source}")]
pub struct SuiteError {
    pub workflow: String,
    #[source]
    pub source: OrchestratorError,
}

/// Run `definitions` with at most `max_concurrency` in flight, until done or
/// `cancel` fires.
///
/// A `max_concurrency` of zero is treated as one.
pub async fn run_suite(
    orchestrator: Arc<WorkflowOrchestrator>,
    definitions: Vec<WorkflowDefinition>,
    max_concurrency: usize,
    cancel: CancellationToken,
) -> Result<SuiteResult, SuiteError> {
    for def in &definitions {
        orchestrator.preflight(def).map_err(|source| SuiteError {
            workflow: def.name.clone(),
            source,
        })?;
    }

    let started = Instant::now();
    let total = definitions.len();
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    tracing::info!(workflows = total, max_concurrency, "suite started");

    let mut set = JoinSet::new();
    let mut names = Vec::with_capacity(total);
    for (index, def) in definitions.into_iter().enumerate() {
        names.push(def.name.clone());
        let orchestrator = Arc::clone(&orchestrator);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        set.spawn(async move {
            // The semaphore is never closed, so `None` means cancelled.
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.acquire_owned() => permit.ok(),
            };
            if permit.is_none() || cancel.is_cancelled() {
                tracing::info!(workflow = %def.name, "suite cancelled before run started");
                return (index, Ok(unstarted(def.name, AbortReason::Cancelled)));
            }
            let result = orchestrator
                .run_with_cancellation(&def, cancel.child_token())
                .await;
            (index, result)
        });
    }

    let mut slots: Vec<Option<WorkflowResult>> = (0..total).map(|_| None).collect();
    let mut failures: Vec<Option<String>> = vec![None; total];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, Ok(result))) => slots[index] = Some(result),
            Ok((index, Err(e))) => {
                tracing::error!(workflow = %names[index], error = %e, "workflow rejected after preflight");
                failures[index] = Some(e.to_string());
            }
            Err(e) => tracing::error!(error = %e, "workflow task panicked"),
        }
    }

    let results: Vec<WorkflowResult> = slots
        .into_iter()
        .zip(failures)
        .zip(names)
        .map(|((slot, failure), name)| {
            slot.unwrap_or_else(|| {
                let error = failure.unwrap_or_else(|| "workflow task panicked".to_string());
                unstarted(name, AbortReason::Lost { error })
            })
        })
        .collect();

    let suite = SuiteResult::from_results(results, started.elapsed().as_millis() as u64);
    tracing::info!(
        total = suite.total,
        passed = suite.passed,
        failed = suite.failed,
        duration_ms = suite.duration_ms,
        "suite finished"
    );
    Ok(suite)
}

/// Result for a run that executed no steps.
fn unstarted(name: String, reason: AbortReason) -> WorkflowResult {
    let now = Utc::now();
    WorkflowResult {
        run_id: Uuid::now_v7(),
        name,
        status: WorkflowStatus::Aborted,
        abort_reason: Some(reason),
        step_results: Vec::new(),
        rollback_executed: false,
        rollback_results: Vec::new(),
        variables: Default::default(),
        start_time: now,
        end_time: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use interlock_types::domain::{CustomAction, CustomOutcome, Domain, RawOutcome, StepAction};
    use interlock_types::result::StepStatus;
    use serde_json::json;

    use crate::driver::{DomainDriver, DriverError, DriverRegistry};

    /// Tracks the peak number of concurrent executions.
    struct Gauge {
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl DomainDriver for Gauge {
        fn domain(&self) -> Domain {
            Domain::Custom
        }

        async fn execute(&self, action: &StepAction) -> Result<RawOutcome, DriverError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            match action {
                StepAction::Custom(c) if c.handler == "fail" => {
                    Err(DriverError::Handler("nope".into()))
                }
                _ => Ok(RawOutcome::Custom(CustomOutcome { data: json!({}) })),
            }
        }
    }

    fn workflow(name: &str, handler: &str) -> WorkflowDefinition {
        WorkflowDefinition::new(name).with_step(interlock_types::workflow::StepDefinition::new(
            "only",
            StepAction::Custom(CustomAction {
                handler: handler.to_string(),
                params: Default::default(),
            }),
        ))
    }

    fn orchestrator(peak: Arc<AtomicUsize>) -> Arc<WorkflowOrchestrator> {
        let registry = DriverRegistry::new().with(Gauge {
            current: Arc::new(AtomicUsize::new(0)),
            peak,
        });
        Arc::new(WorkflowOrchestrator::new(Arc::new(registry)))
    }

    #[tokio::test]
    async fn results_keep_submission_order_and_respect_limit() {
        let peak = Arc::new(AtomicUsize::new(0));
        let defs = (0..6)
            .map(|i| workflow(&format!("wf-{i}"), if i == 2 { "fail" } else { "ok" }))
            .collect();

        let suite = run_suite(orchestrator(peak.clone()), defs, 2, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(suite.total, 6);
        assert_eq!(suite.passed, 5);
        assert_eq!(suite.failed, 1);
        let names: Vec<_> = suite.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["wf-0", "wf-1", "wf-2", "wf-3", "wf-4", "wf-5"]);
        assert_eq!(suite.results[2].status, WorkflowStatus::Aborted);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn invalid_definition_fails_before_any_run() {
        let peak = Arc::new(AtomicUsize::new(0));
        let defs = vec![workflow("good", "ok"), WorkflowDefinition::new("empty")];

        let err = run_suite(orchestrator(peak.clone()), defs, 4, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.workflow, "empty");
        assert_eq!(peak.load(Ordering::SeqCst), 0);
    }

    fn not_started(result: &WorkflowResult) -> bool {
        result.status == WorkflowStatus::Aborted
            && result.abort_reason == Some(AbortReason::Cancelled)
            && result.step_results.is_empty()
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_the_suite_stops_queued_runs() {
        let peak = Arc::new(AtomicUsize::new(0));
        let defs = (0..4).map(|i| workflow(&format!("wf-{i}"), "ok")).collect();
        let cancel = CancellationToken::new();
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                cancel.cancel();
            });
        }

        let suite = run_suite(orchestrator(peak), defs, 1, cancel).await.unwrap();

        assert_eq!(suite.total, 4);
        assert_eq!(suite.passed, 1);
        let interrupted: Vec<_> = suite
            .results
            .iter()
            .filter(|r| r.abort_reason == Some(AbortReason::Cancelled) && !r.step_results.is_empty())
            .collect();
        assert_eq!(interrupted.len(), 1);
        assert_eq!(interrupted[0].step_results[0].status, StepStatus::Error);
        assert_eq!(suite.results.iter().filter(|r| not_started(r)).count(), 2);
    }

    #[tokio::test]
    async fn suite_cancelled_up_front_dispatches_nothing() {
        let peak = Arc::new(AtomicUsize::new(0));
        let defs = (0..3).map(|i| workflow(&format!("wf-{i}"), "ok")).collect();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let suite = run_suite(orchestrator(peak.clone()), defs, 2, cancel).await.unwrap();

        assert!(suite.results.iter().all(not_started));
        assert_eq!(peak.load(Ordering::SeqCst), 0);
        assert!(!suite.is_success());
    }

    #[test]
    fn lost_run_keeps_its_error() {
        let result = unstarted(
            "wf".to_string(),
            AbortReason::Lost {
                error: "task panicked".to_string(),
            },
        );
        assert_eq!(result.status, WorkflowStatus::Aborted);
        assert_eq!(result.abort_reason.unwrap().to_string(), "run lost: task panicked");
    }
}
