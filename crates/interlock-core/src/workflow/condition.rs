//! Run-condition evaluation.
//!
//! Decides whether a step runs, from the results of the steps before it.
//! "Previous" is the most recent result in the list, whatever its status;
//! with no prior results both `previous_*` predicates are false.
//!
//! `expression` conditions are JEXL with this context:
//!
//! ```text
//! steps:    { <name>: { status, passed, failed, duration_ms } }
//! previous: the same shape for the last result, or null
//! vars:     the variable store
//! ```

use serde_json::{json, Map, Value};

use interlock_types::result::{StepResult, StepStatus};
use interlock_types::workflow::{RunCondition, StepDefinition};

use super::expression::{ExpressionError, ExpressionEvaluator};
use super::variables::VariableStore;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    #[error("condition '{expression}' could not be evaluated: {source}")]
    Expression {
        expression: String,
        #[source]
        source: ExpressionError,
    },
}

/// Stateless run-condition evaluator.
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Whether `step` should run given `prior` results.
    pub fn should_run(
        step: &StepDefinition,
        prior: &[StepResult],
        store: &VariableStore,
    ) -> Result<bool, ConditionError> {
        Self::evaluate(&step.run_condition, prior, store)
    }

    pub fn evaluate(
        condition: &RunCondition,
        prior: &[StepResult],
        store: &VariableStore,
    ) -> Result<bool, ConditionError> {
        let status_of = |name: &str| {
            prior
                .iter()
                .rev()
                .find(|r| r.name == name)
                .map(|r| r.status)
        };

        Ok(match condition {
            RunCondition::Always => true,
            RunCondition::PreviousPassed => {
                prior.last().is_some_and(|r| r.status == StepStatus::Passed)
            }
            RunCondition::PreviousFailed => prior.last().is_some_and(|r| r.status.is_failure()),
            RunCondition::StepPassed { step } => status_of(step) == Some(StepStatus::Passed),
            RunCondition::StepFailed { step } => status_of(step).is_some_and(|s| s.is_failure()),
            RunCondition::Expression { expr } => {
                let context = Self::expression_context(prior, store);
                ExpressionEvaluator::new()
                    .evaluate_bool(expr, &context)
                    .map_err(|source| ConditionError::Expression {
                        expression: expr.clone(),
                        source,
                    })?
            }
        })
    }

    /// The JEXL context exposed to `expression` conditions.
    pub fn expression_context(prior: &[StepResult], store: &VariableStore) -> Value {
        let summarize = |r: &StepResult| {
            json!({
                "status": r.status,
                "passed": r.status == StepStatus::Passed,
                "failed": r.status.is_failure(),
                "duration_ms": r.duration_ms,
            })
        };

        let steps: Map<String, Value> = prior
            .iter()
            .map(|r| (r.name.clone(), summarize(r)))
            .collect();
        let previous = prior.last().map(summarize).unwrap_or(Value::Null);

        json!({
            "steps": steps,
            "previous": previous,
            "vars": store.to_value(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interlock_types::domain::{CustomAction, StepAction};

    fn result(name: &str, status: StepStatus) -> StepResult {
        StepResult::new(name, status)
    }

    fn step(condition: RunCondition) -> StepDefinition {
        StepDefinition::new(
            "s",
            StepAction::Custom(CustomAction {
                handler: "echo".to_string(),
                params: Default::default(),
            }),
        )
        .with_condition(condition)
    }

    #[test]
    fn always_runs_first_step() {
        let store = VariableStore::new();
        assert!(ConditionEvaluator::should_run(&step(RunCondition::Always), &[], &store).unwrap());
    }

    #[test]
    fn previous_predicates_false_on_first_step() {
        let store = VariableStore::new();
        assert!(!ConditionEvaluator::evaluate(&RunCondition::PreviousPassed, &[], &store).unwrap());
        assert!(!ConditionEvaluator::evaluate(&RunCondition::PreviousFailed, &[], &store).unwrap());
    }

    #[test]
    fn previous_refers_to_last_result() {
        let store = VariableStore::new();
        let prior = vec![
            result("a", StepStatus::Passed),
            result("b", StepStatus::Error),
        ];
        assert!(ConditionEvaluator::evaluate(&RunCondition::PreviousFailed, &prior, &store).unwrap());
        assert!(!ConditionEvaluator::evaluate(&RunCondition::PreviousPassed, &prior, &store).unwrap());

        let prior = vec![result("a", StepStatus::Failed), result("b", StepStatus::Skipped)];
        assert!(!ConditionEvaluator::evaluate(&RunCondition::PreviousFailed, &prior, &store).unwrap());
    }

    #[test]
    fn named_step_predicates() {
        let store = VariableStore::new();
        let prior = vec![
            result("create", StepStatus::Passed),
            result("verify", StepStatus::Failed),
        ];
        let passed = |s: &str| RunCondition::StepPassed { step: s.to_string() };
        let failed = |s: &str| RunCondition::StepFailed { step: s.to_string() };
        assert!(ConditionEvaluator::evaluate(&passed("create"), &prior, &store).unwrap());
        assert!(ConditionEvaluator::evaluate(&failed("verify"), &prior, &store).unwrap());
        assert!(!ConditionEvaluator::evaluate(&passed("verify"), &prior, &store).unwrap());
        assert!(!ConditionEvaluator::evaluate(&passed("unknown"), &prior, &store).unwrap());
    }

    #[test]
    fn expression_sees_steps_and_vars() {
        let mut store = VariableStore::new();
        store.bind("env", json!("staging"));
        let prior = vec![result("create", StepStatus::Passed)];
        let condition = RunCondition::Expression {
            expr: "steps.create.passed && vars.env == 'staging'".to_string(),
        };
        assert!(ConditionEvaluator::evaluate(&condition, &prior, &store).unwrap());

        let condition = RunCondition::Expression {
            expr: "previous.status == 'failed'".to_string(),
        };
        assert!(!ConditionEvaluator::evaluate(&condition, &prior, &store).unwrap());
    }

    #[test]
    fn malformed_expression_is_an_error() {
        let store = VariableStore::new();
        let condition = RunCondition::Expression {
            expr: "steps.create.passed &&".to_string(),
        };
        assert!(matches!(
            ConditionEvaluator::evaluate(&condition, &[], &store),
            Err(ConditionError::Expression { .. })
        ));
    }
}
