//! Custom validation: path assertions over handler data plus an optional
//! expression bound as `output`.

use serde_json::json;

use interlock_types::domain::{CustomOutcome, CustomValidation};
use interlock_types::result::ValidationResult;

use super::{check_path_assertion, Checks};
use crate::workflow::expression::ExpressionEvaluator;

pub(super) fn validate(outcome: &CustomOutcome, validation: &CustomValidation) -> ValidationResult {
    let mut checks = Checks::new();

    for assertion in &validation.assertions {
        check_path_assertion(&outcome.data, assertion, &mut checks);
    }

    if let Some(expression) = &validation.expression {
        let context = json!({ "output": outcome.data });
        match ExpressionEvaluator::new().evaluate_bool(expression, &context) {
            Ok(ok) => checks.check(ok, format!("expression {expression}")),
            Err(e) => checks.fail(format!("expression {expression}: {e}")),
        }
    }

    checks.finish()
}
