//! Saga-style compensation.
//!
//! The coordinator keeps an ordered ledger of `(step, compensation)` for
//! every step that passed and declares a `rollback`. When a run triggers
//! rollback, the ledger is walked in reverse insertion order and then the
//! workflow's `rollback_steps` run in definition order.
//!
//! Compensations go through the regular dispatcher (interpolation, retries,
//! step timeout) but are not bounded by the run's deadline or cancellation
//! token, and they do not bind outputs. A failed compensation is recorded and
//! the sweep continues; nothing here returns an error to the caller.

use chrono::Utc;
use uuid::Uuid;

use interlock_types::event::RunEvent;
use interlock_types::result::{StepResult, StepStatus};
use interlock_types::workflow::StepDefinition;

use crate::event::EventBus;

use super::dispatcher::{DispatchError, RunScope, StepDispatcher};
use super::variables::VariableStore;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A single compensation failure, recorded in its `StepResult`.
#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("compensation '{step}' failed: {source}")]
    Dispatch {
        step: String,
        #[source]
        source: DispatchError,
    },

    #[error("compensation '{step}' did not pass its validation")]
    Validation { step: String },
}

// ---------------------------------------------------------------------------
// RollbackCoordinator
// ---------------------------------------------------------------------------

/// One compensable step.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// The step being compensated.
    pub step: String,
    pub compensation: StepDefinition,
}

/// Ordered ledger of compensations for one run.
#[derive(Debug, Default)]
pub struct RollbackCoordinator {
    ledger: Vec<LedgerEntry>,
}

impl RollbackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `step` passed and can be undone by `compensation`.
    pub fn record(&mut self, step: &str, compensation: &StepDefinition) {
        tracing::debug!(step, compensation = %compensation.name, "compensation recorded");
        self.ledger.push(LedgerEntry {
            step: step.to_string(),
            compensation: compensation.clone(),
        });
    }

    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    /// Entries in the order they will be compensated (newest first).
    pub fn pending(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.ledger.iter().rev()
    }

    /// Walk the ledger in reverse, then run `rollback_steps` in order.
    ///
    /// Returns one result per compensation, in execution order.
    pub async fn execute(
        &self,
        dispatcher: &StepDispatcher,
        run_id: Uuid,
        rollback_steps: &[StepDefinition],
        store: &VariableStore,
        events: Option<&EventBus>,
    ) -> Vec<StepResult> {
        let scope = RunScope::unbounded(run_id);
        let total = self.ledger.len() + rollback_steps.len();

        tracing::info!(%run_id, compensations = total, "rollback started");
        if let Some(events) = events {
            events.publish(RunEvent::RollbackStarted {
                run_id,
                compensations: total,
            });
        }

        let work = self
            .pending()
            .map(|entry| (&entry.compensation, Some(entry.step.as_str())))
            .chain(rollback_steps.iter().map(|step| (step, None)));

        let mut results = Vec::with_capacity(total);
        for (step, compensates) in work {
            let result = compensate(dispatcher, &scope, step, compensates, store).await;
            if let Some(events) = events {
                events.publish(RunEvent::CompensationFinished {
                    run_id,
                    step: result.name.clone(),
                    status: result.status,
                });
            }
            results.push(result);
        }

        let failed = results.iter().filter(|r| r.status.is_failure()).count();
        tracing::info!(%run_id, compensations = total, failed, "rollback finished");
        results
    }
}

/// Run one compensation and turn whatever happens into a `StepResult`.
async fn compensate(
    dispatcher: &StepDispatcher,
    scope: &RunScope,
    step: &StepDefinition,
    compensates: Option<&str>,
    store: &VariableStore,
) -> StepResult {
    let started_at = Utc::now();
    let mut result = StepResult::new(&step.name, StepStatus::Passed);
    result.started_at = started_at;
    result.compensates = compensates.map(str::to_string);

    match dispatcher.dispatch(scope, step, store).await {
        Ok(dispatched) => {
            result.duration_ms = dispatched.duration.as_millis() as u64;
            result.retries_used = dispatched.retries_used;
            if let Some(validation) = &step.validation {
                let check = dispatcher.validate(&dispatched.outcome, validation);
                if !check.passed {
                    result.status = StepStatus::Failed;
                    result.error = Some(
                        RollbackError::Validation {
                            step: step.name.clone(),
                        }
                        .to_string(),
                    );
                }
                result.validation_detail = Some(check.detail);
            }
            result.raw_outcome = Some(dispatched.outcome);
        }
        Err(source) => {
            result.status = StepStatus::Error;
            result.duration_ms = source.duration().as_millis() as u64;
            result.retries_used = source.retries_used();
            result.error = Some(
                RollbackError::Dispatch {
                    step: step.name.clone(),
                    source,
                }
                .to_string(),
            );
        }
    }

    if result.status.is_failure() {
        tracing::warn!(
            run_id = %scope.run_id,
            step = %step.name,
            compensates = compensates.unwrap_or("-"),
            error = result.error.as_deref().unwrap_or(""),
            "compensation failed"
        );
    } else {
        tracing::debug!(run_id = %scope.run_id, step = %step.name, "compensation succeeded");
    }

    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
