//! Step dispatch: interpolate, route to the domain driver, retry, time.
//!
//! The dispatcher owns the retry loop. Each attempt is bounded by the step's
//! timeout and raced against the run's cancellation token and deadline, so a
//! cancelled or expired run stops mid-attempt rather than after it.
//!
//! Step duration is the sum of attempt durations; retry delays are excluded.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use interlock_types::domain::{Domain, RawOutcome, Validation};
use interlock_types::event::RunEvent;
use interlock_types::result::ValidationResult;
use interlock_types::workflow::StepDefinition;

use crate::driver::{DriverError, DriverRegistry};
use crate::event::EventBus;

use super::evaluator;
use super::retry::RetryHandler;
use super::template::{interpolate_action, TemplateError};
use super::variables::VariableStore;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A successfully executed action.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub outcome: RawOutcome,
    /// Sum of all attempt durations.
    pub duration: Duration,
    pub retries_used: u32,
}

/// Why a dispatch produced no outcome.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Interpolation failed; never retried.
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("no driver registered for domain '{0}'")]
    NoDriver(Domain),

    /// Every attempt failed; `source` is the last driver error.
    #[error("driver error after {attempts} attempt(s): {source}")]
    Driver {
        attempts: u32,
        duration: Duration,
        #[source]
        source: DriverError,
    },

    /// Every attempt failed and the last one exceeded the step timeout.
    #[error("step timed out after {timeout:?} ({attempts} attempt(s))")]
    TimedOut {
        attempts: u32,
        duration: Duration,
        timeout: Duration,
    },

    #[error("run cancelled during dispatch")]
    Cancelled { attempts: u32, duration: Duration },

    #[error("workflow deadline reached during dispatch")]
    DeadlineExceeded { attempts: u32, duration: Duration },
}

impl DispatchError {
    /// Time spent in driver calls before giving up.
    pub fn duration(&self) -> Duration {
        match self {
            DispatchError::Template(_) | DispatchError::NoDriver(_) => Duration::ZERO,
            DispatchError::Driver { duration, .. }
            | DispatchError::TimedOut { duration, .. }
            | DispatchError::Cancelled { duration, .. }
            | DispatchError::DeadlineExceeded { duration, .. } => *duration,
        }
    }

    /// Attempts beyond the first.
    pub fn retries_used(&self) -> u32 {
        match self {
            DispatchError::Template(_) | DispatchError::NoDriver(_) => 0,
            DispatchError::Driver { attempts, .. }
            | DispatchError::TimedOut { attempts, .. }
            | DispatchError::Cancelled { attempts, .. }
            | DispatchError::DeadlineExceeded { attempts, .. } => attempts.saturating_sub(1),
        }
    }
}

/// Run-level bounds every attempt is raced against.
#[derive(Debug, Clone)]
pub struct RunScope {
    pub run_id: Uuid,
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
}

impl RunScope {
    pub fn new(run_id: Uuid, cancel: CancellationToken, deadline: Option<Instant>) -> Self {
        Self {
            run_id,
            cancel,
            deadline,
        }
    }

    /// A scope that is never cancelled and has no deadline.
    pub fn unbounded(run_id: Uuid) -> Self {
        Self::new(run_id, CancellationToken::new(), None)
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    async fn deadline_reached(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}

enum AttemptError {
    Driver(DriverError),
    TimedOut,
}

// ---------------------------------------------------------------------------
// StepDispatcher
// ---------------------------------------------------------------------------

/// Routes steps to their domain driver.
pub struct StepDispatcher {
    registry: Arc<DriverRegistry>,
    default_step_timeout: Duration,
    events: Option<EventBus>,
}

impl StepDispatcher {
    pub fn new(registry: Arc<DriverRegistry>, default_step_timeout: Duration) -> Self {
        Self {
            registry,
            default_step_timeout,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Per-attempt timeout for steps that do not set `timeout_secs`.
    pub fn with_default_step_timeout(mut self, timeout: Duration) -> Self {
        self.default_step_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Interpolate `step`'s action and execute it with retries.
    pub async fn dispatch(
        &self,
        scope: &RunScope,
        step: &StepDefinition,
        store: &VariableStore,
    ) -> Result<Dispatched, DispatchError> {
        let domain = step.domain();
        let driver = self
            .registry
            .get(domain)
            .ok_or(DispatchError::NoDriver(domain))?;
        let action = interpolate_action(&step.action, store)?;

        let policy = &step.error_handling;
        let step_timeout = step
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_step_timeout);

        let mut total = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            tracing::debug!(
                run_id = %scope.run_id,
                step = %step.name,
                %domain,
                attempt,
                action = %action.summary(),
                "dispatching step"
            );

            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = scope.cancel.cancelled() => {
                    total += started.elapsed();
                    return Err(DispatchError::Cancelled { attempts: attempt, duration: total });
                }
                _ = scope.deadline_reached() => {
                    total += started.elapsed();
                    return Err(DispatchError::DeadlineExceeded { attempts: attempt, duration: total });
                }
                r = tokio::time::timeout(step_timeout, driver.execute(&action)) => match r {
                    Ok(Ok(outcome)) => Ok(outcome),
                    Ok(Err(e)) => Err(AttemptError::Driver(e)),
                    Err(_) => Err(AttemptError::TimedOut),
                },
            };
            let elapsed = started.elapsed();
            total += elapsed;

            let error = match result {
                Ok(outcome) => {
                    tracing::debug!(
                        run_id = %scope.run_id,
                        step = %step.name,
                        attempt,
                        duration_ms = elapsed.as_millis() as u64,
                        "attempt succeeded"
                    );
                    return Ok(Dispatched {
                        outcome,
                        duration: total,
                        retries_used: attempt - 1,
                    });
                }
                Err(e) => e,
            };

            let message = match &error {
                AttemptError::Driver(e) => e.to_string(),
                AttemptError::TimedOut => format!("attempt timed out after {step_timeout:?}"),
            };

            if !RetryHandler::should_retry(policy, attempt) {
                tracing::warn!(
                    run_id = %scope.run_id,
                    step = %step.name,
                    attempts = attempt,
                    error = %message,
                    "step dispatch failed"
                );
                return Err(match error {
                    AttemptError::Driver(source) => DispatchError::Driver {
                        attempts: attempt,
                        duration: total,
                        source,
                    },
                    AttemptError::TimedOut => DispatchError::TimedOut {
                        attempts: attempt,
                        duration: total,
                        timeout: step_timeout,
                    },
                });
            }

            tracing::warn!(
                run_id = %scope.run_id,
                step = %step.name,
                attempt,
                error = %message,
                delay_ms = policy.retry_delay_ms,
                "step attempt failed, retrying"
            );
            if let Some(events) = &self.events {
                events.publish(RunEvent::StepRetrying {
                    run_id: scope.run_id,
                    step: step.name.clone(),
                    attempt,
                    error: message,
                });
            }

            let delay = RetryHandler::delay(policy);
            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = scope.cancel.cancelled() => {
                        return Err(DispatchError::Cancelled { attempts: attempt, duration: total });
                    }
                    _ = scope.deadline_reached() => {
                        return Err(DispatchError::DeadlineExceeded { attempts: attempt, duration: total });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    /// Validate through the domain's driver, or the core evaluator if none.
    pub fn validate(&self, outcome: &RawOutcome, validation: &Validation) -> ValidationResult {
        match self.registry.get(outcome.domain()) {
            Some(driver) => driver.validate(outcome, validation),
            None => evaluator::validate(outcome, validation),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
