//! API validation: status, headers, body assertions, and response time.

use interlock_types::domain::{ApiOutcome, ApiValidation};
use interlock_types::result::ValidationResult;

use super::{check_path_assertion, Checks};
use crate::workflow::extract::api_root;

pub(super) fn validate(outcome: &ApiOutcome, validation: &ApiValidation) -> ValidationResult {
    let mut checks = Checks::new();

    if let Some(expected) = validation.status {
        checks.check(
            outcome.status == expected,
            format!("status == {expected} (got {})", outcome.status),
        );
    }

    for (name, expected) in &validation.headers {
        let actual = outcome
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str());
        match actual {
            Some(actual) => checks.check(
                actual == expected,
                format!("header {name} == '{expected}' (got '{actual}')"),
            ),
            None => checks.fail(format!("header {name} missing")),
        }
    }

    if !validation.body.is_empty() {
        let root = api_root(outcome);
        for assertion in &validation.body {
            check_path_assertion(&root, assertion, &mut checks);
        }
    }

    if let Some(max) = validation.max_response_time_ms {
        checks.check(
            outcome.elapsed_ms <= max,
            format!("response time <= {max}ms (got {}ms)", outcome.elapsed_ms),
        );
    }

    checks.finish()
}
