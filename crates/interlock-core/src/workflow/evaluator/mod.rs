//! Expectation evaluators, one per domain.
//!
//! Each evaluator turns a `RawOutcome` plus a declarative `Validation` into a
//! [`ValidationResult`]. Every check contributes one line of detail, so a
//! failed result explains every mismatch, not just the first.
//!
//! Evaluators are pure and synchronous. Drivers use [`validate`] as their
//! default implementation of `DomainDriver::validate`.

mod api;
mod assertion;
mod custom;
mod database;
mod ui;

pub use assertion::{check_path_assertion, values_equal};

use interlock_types::domain::{RawOutcome, Validation};
use interlock_types::result::ValidationResult;

/// Check `outcome` against `validation`.
///
/// A validation whose domain differs from the outcome's fails with a
/// diagnostic rather than panicking.
pub fn validate(outcome: &RawOutcome, validation: &Validation) -> ValidationResult {
    match (outcome, validation) {
        (RawOutcome::Ui(o), Validation::Ui(v)) => ui::validate(o, v),
        (RawOutcome::Api(o), Validation::Api(v)) => api::validate(o, v),
        (RawOutcome::Database(o), Validation::Database(v)) => database::validate(o, v),
        (RawOutcome::Custom(o), Validation::Custom(v)) => custom::validate(o, v),
        (outcome, validation) => ValidationResult::fail(format!(
            "validation domain '{}' does not match outcome domain '{}'",
            validation.domain(),
            outcome.domain()
        )),
    }
}

// ---------------------------------------------------------------------------
// Checks accumulator
// ---------------------------------------------------------------------------

/// Collects individual check lines into a single result.
#[derive(Debug, Default)]
pub struct Checks {
    lines: Vec<String>,
    failed: usize,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, description: impl Into<String>) {
        let description = description.into();
        if ok {
            self.lines.push(format!("ok: {description}"));
        } else {
            self.failed += 1;
            self.lines.push(format!("FAIL: {description}"));
        }
    }

    pub fn fail(&mut self, description: impl Into<String>) {
        self.check(false, description);
    }

    pub fn finish(self) -> ValidationResult {
        if self.lines.is_empty() {
            return ValidationResult::pass("no checks declared");
        }
        let detail = self.lines.join("\n");
        if self.failed == 0 {
            ValidationResult::pass(detail)
        } else {
            ValidationResult::fail(detail)
        }
    }
}
